//! # recmux-format
//!
//! recmux 容器封装库.
//!
//! 本 crate 对标 FFmpeg 的 libavformat 中输出相关的部分:
//!
//! - **I/O 适配**: [`Sink`] 与带固定中间缓冲区的 [`IoContext`]
//! - **封装器**: [`Muxer`] trait 与 MP4 实现
//! - **封装会话**: [`FormatContext`], 负责轨道注册, 生命周期与数据包流水线
//!
//! ## 使用示例
//!
//! ```rust
//! use recmux_format::{FormatContext, LifecycleState, MemorySink};
//!
//! let sink = MemorySink::new();
//! let mut ctx = FormatContext::create(sink.clone()).unwrap();
//! let track = ctx.add_audio_track(128_000, 44100, 2).unwrap();
//! ctx.write_header().unwrap();
//! ctx.write_packet(track, &[0x21, 0x10, 0x04], 0, true).unwrap();
//! ctx.write_trailer().unwrap();
//! assert_eq!(ctx.state(), LifecycleState::TrailerWritten);
//! ctx.release();
//!
//! assert_eq!(&sink.data()[4..8], b"ftyp");
//! ```

pub mod context;
pub mod format_id;
pub mod io;
pub mod muxer;
pub mod muxers;
pub mod options;
pub mod registry;
pub mod stream;

// 重导出常用类型
pub use context::{FormatContext, LifecycleState};
pub use format_id::FormatId;
pub use io::{CallbackSink, IoContext, MemorySink, Sink, WriterSink};
pub use muxer::Muxer;
pub use options::{MuxOptions, PacketErrorPolicy};
pub use registry::FormatRegistry;
pub use stream::{AudioStreamParams, SideData, Stream, StreamParams, VideoStreamParams};

/// 注册所有内置封装器
pub fn register_all(registry: &mut FormatRegistry) {
    muxers::register_all_muxers(registry);
}
