//! # recmux
//!
//! 纯 Rust 实现的流式 MP4 录制封装库.
//!
//! 调用方提供压缩好的 H.264 视频帧和 AAC 音频帧, recmux 把它们封装为 MP4,
//! 字节经由调用方的 sink 输出:
//! - **轨道注册**: 音频轨道协商 AAC 参数, 视频轨道支持旋转提示
//! - **数据包流水线**: 微秒时间戳换算到轨道时间基, 帧数据交给封装器
//! - **I/O 适配**: 固定大小的中间缓冲区, 支持回写 `mdat` 大小
//!
//! # 快速开始
//!
//! ```rust
//! use recmux::format::{FormatContext, MemorySink};
//!
//! let sink = MemorySink::new();
//! let mut ctx = FormatContext::create(sink.clone()).unwrap();
//! let audio = ctx.add_audio_track(128_000, 44100, 2).unwrap();
//! ctx.write_header().unwrap();
//! ctx.write_packet(audio, &[0x21, 0x10, 0x04], 0, true).unwrap();
//! ctx.write_trailer().unwrap();
//! ctx.release();
//! assert!(sink.len() > 0);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `recmux-core` | 核心类型与工具 |
//! | `recmux-codec` | 编码参数协商与码流工具 |
//! | `recmux-format` | I/O 适配, MP4 封装器与封装会话 |
//! | `recmux-ffi` | C FFI 导出层 |

pub mod logging;

/// 核心类型与工具 (对标 libavutil)
pub use recmux_core as core;

/// 编码参数协商与码流工具 (对标 libavcodec)
pub use recmux_codec as codec;

/// 容器封装 (对标 libavformat)
pub use recmux_format as format;

/// 获取 recmux 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置编码器的注册表
pub fn default_codec_registry() -> recmux_codec::CodecRegistry {
    let mut registry = recmux_codec::CodecRegistry::new();
    recmux_codec::register_all(&mut registry);
    registry
}

/// 创建已注册所有内置封装器的注册表
pub fn default_format_registry() -> recmux_format::FormatRegistry {
    let mut registry = recmux_format::FormatRegistry::new();
    recmux_format::register_all(&mut registry);
    registry
}
