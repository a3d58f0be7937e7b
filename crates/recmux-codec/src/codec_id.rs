//! 编解码器标识符.
//!
//! 对标 FFmpeg 的 `AVCodecID`. 录制封装只涉及 H.264 视频和 AAC 音频.

use recmux_core::MediaType;
use std::fmt;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器
    None,
    /// H.264 / AVC / MPEG-4 Part 10
    H264,
    /// AAC (Advanced Audio Coding)
    Aac,
}

impl CodecId {
    /// 获取编解码器对应的媒体类型, 未知编解码器返回 `None`
    pub const fn media_type(&self) -> Option<MediaType> {
        match self {
            Self::None => None,
            Self::H264 => Some(MediaType::Video),
            Self::Aac => Some(MediaType::Audio),
        }
    }

    /// 获取编解码器的名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::H264 => "h264",
            Self::Aac => "aac",
        }
    }

    /// MP4 `stsd` 中的采样条目类型
    pub const fn mp4_sample_entry(&self) -> Option<&'static [u8; 4]> {
        match self {
            Self::H264 => Some(b"avc1"),
            Self::Aac => Some(b"mp4a"),
            Self::None => None,
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
