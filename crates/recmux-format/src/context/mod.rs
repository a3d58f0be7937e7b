//! 封装会话 (FormatContext).
//!
//! 对标 FFmpeg 的 `AVFormatContext`: 一次录制对应一个上下文, 持有输出格式,
//! 已注册的轨道列表和 I/O 适配器. 所有操作都是带状态检查的方法:
//!
//! ```text
//! Created ──write_header──▶ HeaderWritten ──write_trailer──▶ TrailerWritten
//!    │                           │
//!    └──头部失败──▶ Failed ◀──数据包失败 (Abort 策略)
//! ```
//!
//! 轨道只能在 `Created` 状态添加, 数据包只能在 `HeaderWritten` 状态写入.
//! 状态检查先于任何修改, 被拒绝的调用不改变上下文.

mod pipeline;
mod registrar;

use std::fmt;

use recmux_codec::CodecRegistry;
use recmux_core::{MuxError, MuxResult};

use crate::format_id::FormatId;
use crate::io::{IoContext, Sink};
use crate::muxer::Muxer;
use crate::options::{MuxOptions, PacketErrorPolicy};
use crate::registry::FormatRegistry;
use crate::stream::Stream;

/// 会话生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// 已创建, 可以添加轨道
    Created,
    /// 头部已写入, 可以写数据包
    HeaderWritten,
    /// 尾部已写入, 会话结束
    TrailerWritten,
    /// 发生不可恢复的错误, 只能释放
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "已创建",
            Self::HeaderWritten => "头部已写入",
            Self::TrailerWritten => "尾部已写入",
            Self::Failed => "已失败",
        };
        write!(f, "{name}")
    }
}

/// 封装会话
pub struct FormatContext {
    /// 输出格式
    format: FormatId,
    /// 容器封装器
    muxer: Box<dyn Muxer>,
    /// I/O 适配器 (独占)
    io: IoContext,
    /// 已注册的轨道, 索引即轨道号
    streams: Vec<Stream>,
    /// 用于音频参数协商的编码器注册表
    codecs: CodecRegistry,
    /// 数据包失败策略
    packet_error_policy: PacketErrorPolicy,
    /// 生命周期状态
    state: LifecycleState,
}

impl FormatContext {
    /// 使用默认配置创建会话
    pub fn create(sink: impl Sink + 'static) -> MuxResult<Self> {
        Self::create_with_options(sink, &MuxOptions::default())
    }

    /// 使用指定配置创建会话
    ///
    /// 输出格式按 `options.format` 选择; 中间缓冲区在此一次性分配,
    /// 分配失败返回 [`MuxError::OutOfMemory`].
    pub fn create_with_options(sink: impl Sink + 'static, options: &MuxOptions) -> MuxResult<Self> {
        let formats = FormatRegistry::with_builtin();
        let format = formats
            .guess_format(Some(&options.format), None)
            .ok_or_else(|| {
                MuxError::Unsupported(format!("不支持的输出格式: {}", options.format))
            })?;
        let muxer = formats.create_muxer(format)?;
        let io = IoContext::with_buffer_size(Box::new(sink), options.io_buffer_size)?;

        log::debug!(
            target: "recmux",
            "创建封装会话: 格式 {format}, 缓冲区 {} 字节",
            io.buffer_size()
        );
        Ok(Self {
            format,
            muxer,
            io,
            streams: Vec::new(),
            codecs: CodecRegistry::with_builtin(),
            packet_error_policy: options.packet_error_policy,
            state: LifecycleState::Created,
        })
    }

    /// 当前生命周期状态
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// 已注册的轨道
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// 输出格式
    pub fn output_format(&self) -> FormatId {
        self.format
    }

    /// 轨道数量
    pub fn nb_tracks(&self) -> usize {
        self.streams.len()
    }

    /// 逻辑输出大小 (含未 flush 的缓冲)
    pub fn bytes_written(&self) -> u64 {
        self.io.size()
    }

    /// 释放会话: 丢弃封装器, 释放中间缓冲区并关闭 sink
    ///
    /// 消耗上下文, 之后无法再使用. 未写尾部就释放时输出没有索引.
    pub fn release(self) {
        log::debug!(
            target: "recmux",
            "释放封装会话: 状态 {}, 共 {} 字节",
            self.state,
            self.io.size()
        );
        drop(self);
    }

    /// 检查当前状态是否允许操作 `op`
    fn expect_state(&self, expected: LifecycleState, op: &str) -> MuxResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(MuxError::InvalidState(format!(
                "{op}需要状态 [{expected}], 当前状态 [{}]",
                self.state
            )))
        }
    }
}

impl Drop for FormatContext {
    fn drop(&mut self) {
        if self.state == LifecycleState::HeaderWritten {
            log::warn!(
                target: "recmux",
                "封装会话在写入尾部前被释放, 输出缺少索引"
            );
        }
        self.io.close();
    }
}

impl fmt::Debug for FormatContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatContext")
            .field("format", &self.format)
            .field("state", &self.state)
            .field("streams", &self.streams.len())
            .field("io", &self.io)
            .finish()
    }
}
