//! 流信息定义.
//!
//! 对标 FFmpeg 的 `AVStream`, 描述输出容器中的一条音频或视频轨道.

use recmux_codec::CodecId;
use recmux_core::{ChannelLayout, DisplayMatrix, MediaType, PixelFormat, Rational, SampleFormat};

/// 流信息
#[derive(Debug, Clone)]
pub struct Stream {
    /// 流索引 (注册顺序, 从 0 开始)
    pub index: usize,
    /// 媒体类型
    pub media_type: MediaType,
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 时间基, 数据包时间戳的单位
    pub time_base: Rational,
    /// 编解码器私有数据 (avcC / AudioSpecificConfig)
    pub extra_data: Vec<u8>,
    /// 流特定参数
    pub params: StreamParams,
    /// 附加数据 (显示矩阵等)
    pub side_data: Vec<SideData>,
}

/// 流特定参数
#[derive(Debug, Clone)]
pub enum StreamParams {
    /// 视频流参数
    Video(VideoStreamParams),
    /// 音频流参数
    Audio(AudioStreamParams),
}

/// 视频流参数
#[derive(Debug, Clone)]
pub struct VideoStreamParams {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 帧率
    pub frame_rate: Rational,
    /// 码率 (bps)
    pub bit_rate: u64,
}

/// 音频流参数
#[derive(Debug, Clone)]
pub struct AudioStreamParams {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道布局
    pub channel_layout: ChannelLayout,
    /// 采样格式
    pub sample_format: SampleFormat,
    /// 码率 (bps)
    pub bit_rate: u64,
    /// 每帧采样数 (AAC 为 1024)
    pub frame_size: u32,
}

/// 流附加数据, 对标 `AVPacketSideData`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideData {
    /// 显示矩阵 (画面旋转)
    DisplayMatrix(DisplayMatrix),
}

impl Stream {
    /// 视频参数 (如果是视频流)
    pub fn video(&self) -> Option<&VideoStreamParams> {
        match &self.params {
            StreamParams::Video(v) => Some(v),
            StreamParams::Audio(_) => None,
        }
    }

    /// 音频参数 (如果是音频流)
    pub fn audio(&self) -> Option<&AudioStreamParams> {
        match &self.params {
            StreamParams::Audio(a) => Some(a),
            StreamParams::Video(_) => None,
        }
    }

    /// 声明的码率 (bps)
    pub fn bit_rate(&self) -> u64 {
        match &self.params {
            StreamParams::Video(v) => v.bit_rate,
            StreamParams::Audio(a) => a.bit_rate,
        }
    }

    /// 显示矩阵
    pub fn display_matrix(&self) -> Option<&DisplayMatrix> {
        self.side_data.iter().find_map(|sd| match sd {
            SideData::DisplayMatrix(m) => Some(m),
        })
    }
}
