//! H.264 SPS (Sequence Parameter Set) 头部解析.
//!
//! 构建 `avcC` 只需要 SPS 开头的几个字段: profile / level, 以及 High 系列
//! profile 才携带的色度格式和位深. 其余字段不做解析.

use recmux_core::bitreader::BitReader;
use recmux_core::{MuxError, MuxResult};

/// SPS 头部字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpsHead {
    /// profile_idc (66=Baseline, 77=Main, 100=High)
    pub profile_idc: u8,
    /// constraint_set 标志位
    pub constraint_set_flags: u8,
    /// level_idc (30=3.0, 41=4.1)
    pub level_idc: u8,
    /// seq_parameter_set_id
    pub sps_id: u32,
    /// 色度格式 (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format_idc: u32,
    /// 亮度位深
    pub bit_depth_luma: u32,
    /// 色度位深
    pub bit_depth_chroma: u32,
}

/// 从 SPS 的 RBSP (不含 NAL 头部字节) 解析头部字段
pub fn parse_sps_head(rbsp: &[u8]) -> MuxResult<SpsHead> {
    let mut br = BitReader::new(rbsp);
    let profile_idc = br.read_bits(8)? as u8;
    let constraint_set_flags = br.read_bits(8)? as u8;
    let level_idc = br.read_bits(8)? as u8;
    let sps_id = br.read_ue()?;
    if sps_id > 31 {
        return Err(MuxError::InvalidData(format!(
            "H.264: SPS id 超出范围: {sps_id}"
        )));
    }

    let mut head = SpsHead {
        profile_idc,
        constraint_set_flags,
        level_idc,
        sps_id,
        chroma_format_idc: 1,
        bit_depth_luma: 8,
        bit_depth_chroma: 8,
    };

    if has_chroma_info(profile_idc) {
        head.chroma_format_idc = br.read_ue()?;
        if head.chroma_format_idc > 3 {
            return Err(MuxError::InvalidData(format!(
                "H.264: chroma_format_idc 非法: {}",
                head.chroma_format_idc
            )));
        }
        if head.chroma_format_idc == 3 {
            br.skip_bits(1)?; // separate_colour_plane_flag
        }
        let luma_minus8 = br.read_ue()?;
        let chroma_minus8 = br.read_ue()?;
        if luma_minus8 > 6 || chroma_minus8 > 6 {
            return Err(MuxError::InvalidData("H.264: 位深超出范围".into()));
        }
        head.bit_depth_luma = luma_minus8 + 8;
        head.bit_depth_chroma = chroma_minus8 + 8;
    }

    Ok(head)
}

/// 携带 chroma_format_idc 与位深字段的 profile
fn has_chroma_info(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}
