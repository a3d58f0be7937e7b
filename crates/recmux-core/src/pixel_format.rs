//! 像素格式定义.
//!
//! 对标 FFmpeg 的 `AVPixelFormat`. 视频轨道只描述编码后的码流,
//! 像素格式仅作为轨道参数记录下来.

use std::fmt;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 未指定
    None,
    /// YUV 4:2:0 平面格式, 8 位, 全范围 (JPEG 范围)
    Yuvj420p,
}

impl PixelFormat {
    /// 是否为全范围 (0-255) 格式
    pub const fn is_full_range(&self) -> bool {
        matches!(self, Self::Yuvj420p)
    }

    /// FFmpeg 风格的格式名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Yuvj420p => "yuvj420p",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
