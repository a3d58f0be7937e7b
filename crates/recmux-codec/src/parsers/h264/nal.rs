//! H.264 NAL (Network Abstraction Layer) 单元处理.
//!
//! # Annex B 格式
//!
//! 使用起始码分隔 NAL 单元: `00 00 01` 或 `00 00 00 01`.
//!
//! # NAL 头部 (1 字节)
//! ```text
//! forbidden_zero_bit(1) | nal_ref_idc(2) | nal_unit_type(5)
//! ```
//!
//! # AVCC 格式
//!
//! 每个 NAL 单元前加 4 字节大端长度, MP4 采样使用这种格式.

use recmux_core::bitreader::BitReader;
use recmux_core::{MuxError, MuxResult};

use super::sps::parse_sps_head;

/// NAL 长度前缀字节数, 写入 avcC 的 lengthSizeMinusOne 为 3
pub const NAL_LENGTH_SIZE: usize = 4;

/// NAL 单元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NalUnitType {
    /// 非 IDR 图像切片 (P/B slice)
    Slice,
    /// 数据分区 A/B/C
    SlicePartition(u8),
    /// IDR 图像切片 (关键帧)
    SliceIdr,
    /// 增补增强信息 (SEI)
    Sei,
    /// 序列参数集 (SPS)
    Sps,
    /// 图像参数集 (PPS)
    Pps,
    /// 访问单元分隔符 (AUD)
    Aud,
    /// 序列结束
    EndOfSequence,
    /// 流结束
    EndOfStream,
    /// 填充数据
    FillerData,
    /// 其他类型
    Other(u8),
}

impl NalUnitType {
    /// 从 NAL 头部字节的低 5 位创建
    pub fn from_type_id(type_id: u8) -> Self {
        match type_id & 0x1F {
            1 => Self::Slice,
            id @ 2..=4 => Self::SlicePartition(id),
            5 => Self::SliceIdr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            10 => Self::EndOfSequence,
            11 => Self::EndOfStream,
            12 => Self::FillerData,
            id => Self::Other(id),
        }
    }

    /// 是否为 VCL (Video Coding Layer) NAL
    pub fn is_vcl(&self) -> bool {
        matches!(
            self,
            Self::Slice | Self::SlicePartition(_) | Self::SliceIdr
        )
    }

    /// 是否为 IDR 切片
    pub fn is_idr(&self) -> bool {
        matches!(self, Self::SliceIdr)
    }

    /// 是否为 SPS 或 PPS
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Sps | Self::Pps)
    }
}

impl std::fmt::Display for NalUnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slice => write!(f, "Slice"),
            Self::SlicePartition(id) => write!(f, "SliceDP({id})"),
            Self::SliceIdr => write!(f, "IDR"),
            Self::Sei => write!(f, "SEI"),
            Self::Sps => write!(f, "SPS"),
            Self::Pps => write!(f, "PPS"),
            Self::Aud => write!(f, "AUD"),
            Self::EndOfSequence => write!(f, "EndOfSeq"),
            Self::EndOfStream => write!(f, "EndOfStream"),
            Self::FillerData => write!(f, "Filler"),
            Self::Other(id) => write!(f, "Other({id})"),
        }
    }
}

/// 借用输入缓冲区的 NAL 单元
#[derive(Debug, Clone, Copy)]
pub struct NalUnit<'a> {
    /// NAL 单元类型
    pub nal_type: NalUnitType,
    /// nal_ref_idc (参考重要性, 0-3)
    pub ref_idc: u8,
    /// NAL 单元数据 (不含起始码, 含头部字节)
    pub data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// 从 NAL 数据 (含头部字节) 解析
    pub fn parse(data: &'a [u8]) -> MuxResult<Self> {
        let header = *data
            .first()
            .ok_or_else(|| MuxError::InvalidData("H.264: NAL 单元数据为空".into()))?;
        if header & 0x80 != 0 {
            return Err(MuxError::InvalidData(
                "H.264: forbidden_zero_bit 非法".into(),
            ));
        }
        Ok(Self {
            nal_type: NalUnitType::from_type_id(header),
            ref_idc: (header >> 5) & 0x03,
            data,
        })
    }

    /// 获取 RBSP (去掉头部字节和防竞争字节)
    pub fn rbsp(&self) -> Vec<u8> {
        remove_emulation_prevention(&self.data[1..])
    }

    /// 切片头中的 first_mb_in_slice, 非 VCL NAL 返回 `None`
    ///
    /// 值为 0 表示新图像的第一个切片.
    pub fn first_mb_in_slice(&self) -> Option<u32> {
        if !self.nal_type.is_vcl() {
            return None;
        }
        // ue(v) 最多 65 位, 只需解开头几个字节
        let head = &self.data[1..self.data.len().min(10)];
        let rbsp = remove_emulation_prevention(head);
        BitReader::new(&rbsp).read_ue().ok()
    }
}

/// 数据是否以 Annex B 起始码开头
pub fn is_annex_b(data: &[u8]) -> bool {
    data.starts_with(&[0, 0, 1]) || data.starts_with(&[0, 0, 0, 1])
}

/// 从 Annex B 字节流中分割出所有 NAL 单元
///
/// 支持 3 字节和 4 字节起始码, 去掉 NAL 之间的尾随零字节.
/// 头部非法的 NAL 单元被跳过.
pub fn split_annex_b(data: &[u8]) -> Vec<NalUnit<'_>> {
    let starts = payload_starts(data);
    let mut nalus = Vec::with_capacity(starts.len());

    for (i, &(begin, _)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map_or(data.len(), |&(_, code_pos)| code_pos);
        let mut nal = &data[begin..end.max(begin)];
        while let [rest @ .., 0] = nal {
            nal = rest;
        }
        if let Ok(nalu) = NalUnit::parse(nal) {
            nalus.push(nalu);
        }
    }

    nalus
}

/// 将 Annex B 格式转换为 AVCC 格式 (4 字节长度前缀)
pub fn annex_b_to_avcc(data: &[u8]) -> Vec<u8> {
    let nalus = split_annex_b(data);
    let total: usize = nalus.iter().map(|n| n.data.len() + NAL_LENGTH_SIZE).sum();
    let mut out = Vec::with_capacity(total);

    for nalu in &nalus {
        out.extend_from_slice(&(nalu.data.len() as u32).to_be_bytes());
        out.extend_from_slice(nalu.data);
    }

    out
}

/// 按 4 字节长度前缀分割 AVCC 采样
///
/// 长度越界时返回 `None`; 头部非法的 NAL 单元被跳过.
pub fn split_avcc(data: &[u8]) -> Option<Vec<NalUnit<'_>>> {
    let mut nalus = Vec::new();
    let mut rest = data;

    while !rest.is_empty() {
        let (len, body) = rest.split_first_chunk::<NAL_LENGTH_SIZE>()?;
        let len = u32::from_be_bytes(*len) as usize;
        if len > body.len() {
            return None;
        }
        let (nal, tail) = body.split_at(len);
        if let Ok(nalu) = NalUnit::parse(nal) {
            nalus.push(nalu);
        }
        rest = tail;
    }

    Some(nalus)
}

/// 码流中出现的参数集
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSets {
    /// SPS 列表 (含 NAL 头部字节)
    pub sps: Vec<Vec<u8>>,
    /// PPS 列表 (含 NAL 头部字节)
    pub pps: Vec<Vec<u8>>,
}

impl ParameterSets {
    /// 收集 NAL 单元中的 SPS/PPS, 重复的参数集只保留一份
    pub fn collect<'a>(nalus: impl IntoIterator<Item = &'a NalUnit<'a>>) -> Self {
        let mut sets = Self::default();
        for nalu in nalus {
            let list = match nalu.nal_type {
                NalUnitType::Sps => &mut sets.sps,
                NalUnitType::Pps => &mut sets.pps,
                _ => continue,
            };
            if !list.iter().any(|p| p.as_slice() == nalu.data) {
                list.push(nalu.data.to_vec());
            }
        }
        sets
    }

    /// 是否同时包含 SPS 和 PPS
    pub fn is_complete(&self) -> bool {
        !self.sps.is_empty() && !self.pps.is_empty()
    }
}

/// 构建 AVCDecoderConfigurationRecord (MP4 `avcC` box 内容)
///
/// High 系列 profile 额外写入色度格式与位深 (ISO/IEC 14496-15 5.3.3.1).
pub fn build_avcc_config(sps_list: &[Vec<u8>], pps_list: &[Vec<u8>]) -> MuxResult<Vec<u8>> {
    let sps0 = sps_list
        .first()
        .ok_or_else(|| MuxError::InvalidData("H.264: 构建 avcC 需要至少一个 SPS".into()))?;
    if sps0.len() < 4 {
        return Err(MuxError::InvalidData("H.264: SPS 数据太短".into()));
    }
    if pps_list.is_empty() {
        return Err(MuxError::InvalidData("H.264: 构建 avcC 需要至少一个 PPS".into()));
    }
    if sps_list.len() > 31 || pps_list.len() > 255 {
        return Err(MuxError::InvalidData("H.264: 参数集数量超出 avcC 上限".into()));
    }

    let mut out = vec![
        1,                                       // configurationVersion
        sps0[1],                                 // AVCProfileIndication
        sps0[2],                                 // profile_compatibility
        sps0[3],                                 // AVCLevelIndication
        0xFC | (NAL_LENGTH_SIZE as u8 - 1),      // lengthSizeMinusOne
        0xE0 | sps_list.len() as u8,             // numOfSequenceParameterSets
    ];
    for sps in sps_list {
        push_parameter_set(&mut out, sps)?;
    }
    out.push(pps_list.len() as u8);
    for pps in pps_list {
        push_parameter_set(&mut out, pps)?;
    }

    if matches!(sps0[1], 100 | 110 | 122 | 144) {
        let nal = NalUnit::parse(sps0)?;
        let head = parse_sps_head(&nal.rbsp())?;
        out.push(0xFC | (head.chroma_format_idc as u8 & 0x03));
        out.push(0xF8 | ((head.bit_depth_luma - 8) as u8 & 0x07));
        out.push(0xF8 | ((head.bit_depth_chroma - 8) as u8 & 0x07));
        out.push(0); // numOfSequenceParameterSetExt
    }

    Ok(out)
}

fn push_parameter_set(out: &mut Vec<u8>, set: &[u8]) -> MuxResult<()> {
    let len = u16::try_from(set.len())
        .map_err(|_| MuxError::InvalidData(format!("H.264: 参数集过长: {} 字节", set.len())))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(set);
    Ok(())
}

// ============================================================
// 内部工具函数
// ============================================================

/// 查找所有起始码, 返回 (NAL 数据起始位置, 起始码位置)
fn payload_starts(data: &[u8]) -> Vec<(usize, usize)> {
    let mut starts = Vec::new();
    let mut i = 0;

    while i + 3 <= data.len() {
        if data[i..i + 3] == [0, 0, 1] {
            starts.push((i + 3, i));
            i += 3;
        } else {
            i += 1;
        }
    }

    starts
}

/// 移除防竞争字节 (`00 00 03` → `00 00`)
fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut rbsp = Vec::with_capacity(data.len());
    let mut zeros = 0;

    for &b in data {
        if zeros >= 2 && b == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if b == 0 { zeros + 1 } else { 0 };
        rbsp.push(b);
    }

    rbsp
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Baseline profile 的 SPS/PPS
    const SPS_BASELINE: [u8; 8] = [0x67, 0x42, 0xC0, 0x1E, 0xD9, 0x00, 0xA0, 0x47];
    const PPS: [u8; 4] = [0x68, 0xCE, 0x38, 0x80];

    #[test]
    fn test_nal_type_property() {
        assert!(NalUnitType::from_type_id(0x65).is_idr());
        assert!(NalUnitType::from_type_id(0x41).is_vcl());
        assert!(NalUnitType::from_type_id(0x67).is_parameter_set());
        assert_eq!(NalUnitType::from_type_id(3), NalUnitType::SlicePartition(3));
        assert_eq!(NalUnitType::from_type_id(20), NalUnitType::Other(20));
    }

    #[test]
    fn test_nal_unit_reject_forbidden_zero_bit() {
        assert!(NalUnit::parse(&[]).is_err());
        assert!(NalUnit::parse(&[0x80 | 0x65]).is_err());
    }

    #[test]
    fn test_annex_b_split_mixed_start_code() {
        let data = [
            0x00, 0x00, 0x00, 0x01, 0x67, 0xAA, // SPS, 4 字节起始码
            0x00, 0x00, 0x01, 0x68, 0xBB, 0x00, // PPS, 3 字节起始码, 尾随零
            0x00, 0x00, 0x01, 0x65, 0x88, 0x84, // IDR
        ];
        let nalus = split_annex_b(&data);
        assert_eq!(nalus.len(), 3);
        assert_eq!(nalus[0].nal_type, NalUnitType::Sps);
        assert_eq!(nalus[0].data, &[0x67, 0xAA]);
        assert_eq!(nalus[1].data, &[0x68, 0xBB]);
        assert_eq!(nalus[2].nal_type, NalUnitType::SliceIdr);
        assert_eq!(nalus[2].data, &[0x65, 0x88, 0x84]);
    }

    #[test]
    fn test_is_annex_b() {
        assert!(is_annex_b(&[0, 0, 1, 0x65]));
        assert!(is_annex_b(&[0, 0, 0, 1, 0x65]));
        assert!(!is_annex_b(&[0, 0, 0, 3, 0x65, 1, 2]));
    }

    #[test]
    fn test_annex_b_to_avcc_convert() {
        let annexb = [
            0x00, 0x00, 0x01, 0x67, 0xAA, // SPS
            0x00, 0x00, 0x01, 0x68, 0xBB, // PPS
        ];
        let avcc = annex_b_to_avcc(&annexb);
        assert_eq!(
            avcc,
            vec![0, 0, 0, 2, 0x67, 0xAA, 0, 0, 0, 2, 0x68, 0xBB]
        );
    }

    #[test]
    fn test_split_avcc() {
        let avcc = [0, 0, 0, 2, 0x67, 0xAA, 0, 0, 0, 3, 0x65, 0x88, 0x84];
        let nalus = split_avcc(&avcc).unwrap();
        assert_eq!(nalus.len(), 2);
        assert_eq!(nalus[0].nal_type, NalUnitType::Sps);
        assert_eq!(nalus[1].data, &[0x65, 0x88, 0x84]);

        // 长度越界
        assert!(split_avcc(&[0, 0, 0, 9, 0x65]).is_none());
        assert!(split_avcc(&[0, 0, 1]).is_none());
    }

    #[test]
    fn test_emulation_prevention_remove() {
        let data = [0x01, 0x00, 0x00, 0x03, 0x02, 0x03];
        assert_eq!(remove_emulation_prevention(&data), vec![0x01, 0x00, 0x00, 0x02, 0x03]);

        let data = [0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x01];
        assert_eq!(remove_emulation_prevention(&data), vec![0x00, 0x00, 0x00, 0x00, 0x01]);

        let data = [0x00, 0x00, 0x03, 0x03, 0x80];
        assert_eq!(remove_emulation_prevention(&data), vec![0x00, 0x00, 0x03, 0x80]);
    }

    #[test]
    fn test_first_mb_in_slice() {
        // first_mb_in_slice = 0 ('1'), = 1 ('010')
        let first = NalUnit::parse(&[0x65, 0b1000_0000]).unwrap();
        assert_eq!(first.first_mb_in_slice(), Some(0));
        let second = NalUnit::parse(&[0x41, 0b0100_0000]).unwrap();
        assert_eq!(second.first_mb_in_slice(), Some(1));
        let sps = NalUnit::parse(&SPS_BASELINE).unwrap();
        assert_eq!(sps.first_mb_in_slice(), None);
    }

    #[test]
    fn test_parameter_sets_dedup() {
        let mut data = Vec::new();
        for _ in 0..2 {
            data.extend_from_slice(&[0, 0, 0, 1]);
            data.extend_from_slice(&SPS_BASELINE);
            data.extend_from_slice(&[0, 0, 0, 1]);
            data.extend_from_slice(&PPS);
        }
        data.extend_from_slice(&[0, 0, 0, 1, 0x65, 0x88]);
        let nalus = split_annex_b(&data);
        let sets = ParameterSets::collect(&nalus);
        assert!(sets.is_complete());
        assert_eq!(sets.sps, vec![SPS_BASELINE.to_vec()]);
        assert_eq!(sets.pps, vec![PPS.to_vec()]);
    }

    #[test]
    fn test_build_avcc_config_baseline() {
        let config = build_avcc_config(&[SPS_BASELINE.to_vec()], &[PPS.to_vec()]).unwrap();
        assert_eq!(&config[..6], &[1, 0x42, 0xC0, 0x1E, 0xFF, 0xE1]);
        assert_eq!(&config[6..8], &[0, 8]);
        assert_eq!(&config[8..16], &SPS_BASELINE);
        assert_eq!(config[16], 1);
        assert_eq!(&config[17..19], &[0, 4]);
        assert_eq!(&config[19..], &PPS);
    }

    #[test]
    fn test_build_avcc_config_high_profile_extension() {
        // profile_idc=100, level 3.1, sps_id=0 ('1'), chroma_format_idc=1 ('010'),
        // bit_depth_luma_minus8=0 ('1'), bit_depth_chroma_minus8=0 ('1')
        let sps = vec![0x67, 100, 0x00, 0x1F, 0b1010_1100];
        let config = build_avcc_config(&[sps], &[PPS.to_vec()]).unwrap();
        let ext = &config[config.len() - 4..];
        assert_eq!(ext, &[0xFD, 0xF8, 0xF8, 0x00]);
    }

    #[test]
    fn test_build_avcc_config_errors() {
        assert!(build_avcc_config(&[], &[PPS.to_vec()]).is_err());
        assert!(build_avcc_config(&[SPS_BASELINE.to_vec()], &[]).is_err());
        assert!(build_avcc_config(&[vec![0x67, 0x42]], &[PPS.to_vec()]).is_err());
    }
}
