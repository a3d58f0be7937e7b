//! AAC ADTS 帧头解析.
//!
//! ADTS 帧头 (7 字节, 有 CRC 时 9 字节):
//! ```text
//! syncword(12) id(1) layer(2) protection_absent(1)
//! profile(2) sampling_frequency_index(4) private(1) channel_configuration(3)
//! original(1) home(1) copyright_id(1) copyright_start(1)
//! frame_length(13) buffer_fullness(11) raw_data_blocks(2)
//! ```
//!
//! 封装进 MP4 时去掉 ADTS 帧头, 帧头信息折算为 AudioSpecificConfig.

use recmux_core::bitreader::BitReader;
use recmux_core::{MuxError, MuxResult};

/// AAC-LC 的 MPEG-4 Audio Object Type
pub const AAC_LC_OBJECT_TYPE: u8 = 2;

/// MPEG-4 标准采样率, 下标即 sampling_frequency_index
pub const MPEG4_SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// 采样率对应的 sampling_frequency_index
pub fn sample_rate_index(sample_rate: u32) -> Option<u8> {
    MPEG4_SAMPLE_RATES
        .iter()
        .position(|&sr| sr == sample_rate)
        .map(|i| i as u8)
}

/// 构建 2 字节 AudioSpecificConfig
///
/// `object_type(5) | sampling_frequency_index(4) | channel_configuration(4) | 000`
pub fn audio_specific_config(object_type: u8, sr_index: u8, channel_config: u8) -> [u8; 2] {
    [
        (object_type << 3) | (sr_index >> 1),
        ((sr_index & 0x01) << 7) | ((channel_config & 0x0F) << 3),
    ]
}

/// ADTS 帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// Audio Object Type (profile + 1)
    pub object_type: u8,
    /// sampling_frequency_index
    pub sample_rate_index: u8,
    /// 声道配置 (0 表示由 PCE 描述)
    pub channel_config: u8,
    /// 整帧长度 (含帧头)
    pub frame_length: usize,
    /// 帧头长度 (7 或 9)
    pub header_length: usize,
    /// 帧内 raw data block 数量
    pub raw_data_blocks: u8,
}

impl AdtsHeader {
    /// 从数据起始处解析 ADTS 帧头
    pub fn parse(data: &[u8]) -> MuxResult<Self> {
        if data.len() < 7 {
            return Err(MuxError::InvalidData("ADTS: 帧头不足 7 字节".into()));
        }

        let mut br = BitReader::new(data);
        if br.read_bits(12)? != 0xFFF {
            return Err(MuxError::InvalidData("ADTS: 同步字错误".into()));
        }
        br.skip_bits(1)?; // id
        if br.read_bits(2)? != 0 {
            return Err(MuxError::InvalidData("ADTS: layer 必须为 0".into()));
        }
        let protection_absent = br.read_flag()?;
        let profile = br.read_bits(2)? as u8;
        let sample_rate_index = br.read_bits(4)? as u8;
        br.skip_bits(1)?; // private_bit
        let channel_config = br.read_bits(3)? as u8;
        br.skip_bits(4)?; // original, home, copyright_id, copyright_start
        let frame_length = br.read_bits(13)? as usize;
        br.skip_bits(11)?; // buffer_fullness
        let raw_data_blocks = br.read_bits(2)? as u8 + 1;

        if usize::from(sample_rate_index) >= MPEG4_SAMPLE_RATES.len() {
            return Err(MuxError::InvalidData(format!(
                "ADTS: 无效的采样率索引 {sample_rate_index}"
            )));
        }
        let header_length = if protection_absent { 7 } else { 9 };
        if frame_length < header_length {
            return Err(MuxError::InvalidData(format!(
                "ADTS: 帧长度 {frame_length} 小于帧头长度 {header_length}"
            )));
        }

        Ok(Self {
            object_type: profile + 1,
            sample_rate_index,
            channel_config,
            frame_length,
            header_length,
            raw_data_blocks,
        })
    }

    /// 采样率 (Hz)
    pub fn sample_rate(&self) -> u32 {
        MPEG4_SAMPLE_RATES[usize::from(self.sample_rate_index)]
    }

    /// 声道数 (声道配置 7 为 8 声道)
    pub fn channels(&self) -> u32 {
        match self.channel_config {
            7 => 8,
            n => u32::from(n),
        }
    }

    /// 对应的 AudioSpecificConfig
    pub fn audio_specific_config(&self) -> [u8; 2] {
        audio_specific_config(self.object_type, self.sample_rate_index, self.channel_config)
    }

    /// 生成无 CRC 的 7 字节帧头, `payload_len` 为原始 AAC 数据长度
    pub fn encode(object_type: u8, sr_index: u8, channel_config: u8, payload_len: usize) -> [u8; 7] {
        let frame_length = payload_len + 7;
        let profile = object_type.saturating_sub(1) & 0x03;
        [
            0xFF,
            0xF1,
            (profile << 6) | ((sr_index & 0x0F) << 2) | ((channel_config >> 2) & 0x01),
            ((channel_config & 0x03) << 6) | ((frame_length >> 11) & 0x03) as u8,
            ((frame_length >> 3) & 0xFF) as u8,
            (((frame_length & 0x07) << 5) as u8) | 0x1F,
            0xFC,
        ]
    }
}

/// 一个 ADTS 帧
#[derive(Debug, Clone, Copy)]
pub struct AdtsFrame<'a> {
    /// 帧头
    pub header: AdtsHeader,
    /// 去掉帧头后的原始 AAC 数据
    pub payload: &'a [u8],
}

/// 将 ADTS 字节流分割为帧
///
/// 遇到损坏的帧头时向后搜索下一个同步字; 末尾不完整的帧被丢弃.
pub fn split_adts(data: &[u8]) -> Vec<AdtsFrame<'_>> {
    let mut frames = Vec::new();
    let mut pos = 0;

    while pos + 7 <= data.len() {
        let header = match AdtsHeader::parse(&data[pos..]) {
            Ok(h) => h,
            Err(_) => {
                pos += 1;
                continue;
            }
        };
        let end = pos + header.frame_length;
        if end > data.len() {
            log::debug!(target: "recmux", "ADTS: 末尾帧不完整, 丢弃 {} 字节", data.len() - pos);
            break;
        }
        frames.push(AdtsFrame {
            header,
            payload: &data[pos + header.header_length..end],
        });
        pos = end;
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_adts_frame(payload: &[u8]) -> Vec<u8> {
        // AAC-LC, 44100 Hz, 立体声
        let mut frame = AdtsHeader::encode(AAC_LC_OBJECT_TYPE, 4, 2, payload.len()).to_vec();
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn test_sample_rate_index() {
        assert_eq!(sample_rate_index(44100), Some(4));
        assert_eq!(sample_rate_index(7350), Some(12));
        assert_eq!(sample_rate_index(44000), None);
    }

    #[test]
    fn test_adts_header_parse() {
        let frame = build_adts_frame(&[0xAA; 100]);
        let header = AdtsHeader::parse(&frame).unwrap();
        assert_eq!(header.object_type, AAC_LC_OBJECT_TYPE);
        assert_eq!(header.sample_rate(), 44100);
        assert_eq!(header.channels(), 2);
        assert_eq!(header.frame_length, 107);
        assert_eq!(header.header_length, 7);
        assert_eq!(header.raw_data_blocks, 1);
        assert_eq!(header.audio_specific_config(), [0x12, 0x10]);
    }

    #[test]
    fn test_adts_invalid_sync() {
        let data = [0x00u8; 16];
        assert!(AdtsHeader::parse(&data).is_err());
        assert!(AdtsHeader::parse(&[0xFF, 0xF1]).is_err());
    }

    #[test]
    fn test_split_adts_frames() {
        let mut data = Vec::new();
        data.extend(build_adts_frame(&[1; 10]));
        data.extend(build_adts_frame(&[2; 20]));
        // 不完整的第三帧
        data.extend(&build_adts_frame(&[3; 30])[..12]);

        let frames = split_adts(&data);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload, &[1u8; 10]);
        assert_eq!(frames[1].payload, &[2u8; 20]);
    }

    #[test]
    fn test_split_adts_resync() {
        let mut data = vec![0x00, 0x12, 0x34];
        data.extend(build_adts_frame(&[7; 5]));
        let frames = split_adts(&data);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, &[7u8; 5]);
    }

    #[test]
    fn test_eight_channel_config() {
        let header = AdtsHeader::encode(AAC_LC_OBJECT_TYPE, 3, 7, 0);
        let parsed = AdtsHeader::parse(&header).unwrap();
        assert_eq!(parsed.channel_config, 7);
        assert_eq!(parsed.channels(), 8);
    }
}
