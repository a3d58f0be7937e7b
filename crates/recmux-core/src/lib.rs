//! # recmux-core
//!
//! recmux 核心库, 提供错误与结果码、有理数时间基、时间戳重缩放、
//! 音视频格式描述以及显示矩阵等基础设施.
//!
//! 本 crate 对标 FFmpeg 的 libavutil 中封装流程用到的部分.

pub mod bitreader;
pub mod channel_layout;
pub mod display;
pub mod error;
pub mod media_type;
pub mod pixel_format;
pub mod rational;
pub mod sample_format;
pub mod timestamp;

// 重导出常用类型
pub use channel_layout::ChannelLayout;
pub use display::DisplayMatrix;
pub use error::{MuxError, MuxResult, MuxStage};
pub use media_type::MediaType;
pub use pixel_format::PixelFormat;
pub use rational::{Rational, Rounding, rescale_q, rescale_rnd};
pub use sample_format::SampleFormat;
pub use timestamp::Timestamp;
