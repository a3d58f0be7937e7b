//! I/O 适配层.
//!
//! 对标 FFmpeg 的自定义 `AVIOContext`: 封装器的所有输出先写入固定大小的
//! 中间缓冲区, 缓冲区满、显式 flush 或 seek 之前再整块转发给调用方提供的
//! [`Sink`]. 封装器只做绝对位置的 seek, 用于回填 box 大小.

use std::fmt;
use std::io::{self, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use recmux_core::{MuxError, MuxResult};

/// 默认中间缓冲区大小 (4 KB)
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// 字节输出目标
///
/// 由调用方实现, 可以是文件、内存或跨语言回调.
pub trait Sink: Send {
    /// 写入数据, 返回接收的字节数. 少于 `buf.len()` 视为失败.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// 定位到绝对偏移, 返回新的位置. 返回值必须等于 `offset`.
    fn seek(&mut self, offset: u64) -> io::Result<u64>;

    /// 释放 sink 持有的外部资源, 会话释放时恰好调用一次
    fn close(&mut self) {}
}

/// 第一次失败的记录, 之后的操作都返回同样的错误
#[derive(Debug, Clone)]
enum Failure {
    Io(io::ErrorKind, String),
    ShortWrite { requested: usize, accepted: usize },
    SeekMismatch { requested: u64, reported: u64 },
}

impl Failure {
    fn from_error(err: &MuxError) -> Self {
        match err {
            MuxError::ShortWrite {
                requested,
                accepted,
            } => Self::ShortWrite {
                requested: *requested,
                accepted: *accepted,
            },
            MuxError::Io(e) => Self::Io(e.kind(), e.to_string()),
            other => Self::Io(io::ErrorKind::Other, other.to_string()),
        }
    }

    fn to_error(&self) -> MuxError {
        match self {
            Self::Io(kind, msg) => MuxError::Io(io::Error::new(*kind, msg.clone())),
            Self::ShortWrite {
                requested,
                accepted,
            } => MuxError::ShortWrite {
                requested: *requested,
                accepted: *accepted,
            },
            Self::SeekMismatch {
                requested,
                reported,
            } => MuxError::InvalidData(format!(
                "sink seek 到 {requested} 却报告位置 {reported}"
            )),
        }
    }
}

/// I/O 上下文
///
/// 持有一个 sink 和一块只分配一次的中间缓冲区.
pub struct IoContext {
    /// 输出目标, 关闭后为 `None`
    sink: Option<Box<dyn Sink>>,
    /// 中间缓冲区, 容量在创建时固定
    buffer: Vec<u8>,
    /// 缓冲区容量
    capacity: usize,
    /// 逻辑写入位置
    pos: u64,
    /// 已写入范围的末尾 (即输出大小)
    end: u64,
    /// 粘滞错误
    failure: Option<Failure>,
}

impl IoContext {
    /// 以默认缓冲区大小创建
    pub fn new(sink: Box<dyn Sink>) -> MuxResult<Self> {
        Self::with_buffer_size(sink, DEFAULT_BUFFER_SIZE)
    }

    /// 以指定缓冲区大小创建
    pub fn with_buffer_size(sink: Box<dyn Sink>, buffer_size: usize) -> MuxResult<Self> {
        if buffer_size == 0 {
            return Err(MuxError::InvalidArgument("I/O 缓冲区大小不能为 0".into()));
        }
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(buffer_size).map_err(|e| {
            MuxError::OutOfMemory(format!("分配 {buffer_size} 字节 I/O 缓冲区失败: {e}"))
        })?;
        Ok(Self {
            sink: Some(sink),
            buffer,
            capacity: buffer_size,
            pos: 0,
            end: 0,
            failure: None,
        })
    }

    // ========================
    // 写入方法
    // ========================

    /// 写入全部数据
    ///
    /// 数据先复制进中间缓冲区, 缓冲区满时整块转发给 sink.
    pub fn write_all(&mut self, mut data: &[u8]) -> MuxResult<()> {
        self.check()?;
        while !data.is_empty() {
            let room = self.capacity - self.buffer.len();
            let n = room.min(data.len());
            self.buffer.extend_from_slice(&data[..n]);
            self.pos += n as u64;
            self.end = self.end.max(self.pos);
            data = &data[n..];
            if self.buffer.len() == self.capacity {
                self.flush_buffer()?;
            }
        }
        Ok(())
    }

    /// 写入 u8
    pub fn write_u8(&mut self, v: u8) -> MuxResult<()> {
        self.write_all(&[v])
    }

    /// 写入 u16 大端
    pub fn write_u16_be(&mut self, v: u16) -> MuxResult<()> {
        self.write_all(&v.to_be_bytes())
    }

    /// 写入 u32 大端
    pub fn write_u32_be(&mut self, v: u32) -> MuxResult<()> {
        self.write_all(&v.to_be_bytes())
    }

    /// 写入 u64 大端
    pub fn write_u64_be(&mut self, v: u64) -> MuxResult<()> {
        self.write_all(&v.to_be_bytes())
    }

    /// 写入 4 字节标签 (FourCC)
    pub fn write_tag(&mut self, tag: &[u8; 4]) -> MuxResult<()> {
        self.write_all(tag)
    }

    /// 把缓冲区中的数据全部交给 sink
    pub fn flush(&mut self) -> MuxResult<()> {
        self.check()?;
        self.flush_buffer()
    }

    // ========================
    // 定位方法
    // ========================

    /// 定位 (seek)
    ///
    /// 先 flush, 再把绝对偏移交给 sink. 不支持相对末尾定位.
    pub fn seek(&mut self, pos: SeekFrom) -> MuxResult<u64> {
        self.check()?;
        let target = match pos {
            SeekFrom::Start(offset) => offset,
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta).ok_or_else(|| {
                MuxError::InvalidArgument(format!("seek 位置越界: {} + {delta}", self.pos))
            })?,
            SeekFrom::End(_) => {
                return Err(MuxError::Unsupported("sink 不支持相对末尾 seek".into()));
            }
        };
        self.flush_buffer()?;

        let result = match self.sink.as_mut() {
            Some(sink) => sink.seek(target).map_err(MuxError::from),
            None => return Err(closed()),
        };
        match result {
            Ok(reported) if reported == target => {
                self.pos = target;
                Ok(target)
            }
            Ok(reported) => Err(self.fail(Failure::SeekMismatch {
                requested: target,
                reported,
            })),
            Err(e) => {
                let failure = Failure::from_error(&e);
                Err(self.fail(failure))
            }
        }
    }

    /// 当前逻辑写入位置
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// 已写入的输出大小 (字节)
    pub fn size(&self) -> u64 {
        self.end
    }

    /// 中间缓冲区容量
    pub fn buffer_size(&self) -> usize {
        self.capacity
    }

    /// 是否已经发生过 I/O 失败
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    /// 关闭: 释放中间缓冲区并调用一次 [`Sink::close`]
    ///
    /// 不会 flush, 未写出的数据被丢弃. 重复调用无效果.
    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if !self.buffer.is_empty() {
                log::debug!(
                    target: "recmux",
                    "关闭 I/O 时丢弃 {} 字节未写出的数据",
                    self.buffer.len()
                );
            }
            self.buffer = Vec::new();
            sink.close();
        }
    }

    // ========================
    // 内部方法
    // ========================

    fn check(&self) -> MuxResult<()> {
        if self.sink.is_none() {
            return Err(closed());
        }
        match &self.failure {
            Some(f) => Err(f.to_error()),
            None => Ok(()),
        }
    }

    fn flush_buffer(&mut self) -> MuxResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let requested = self.buffer.len();
        let result = match self.sink.as_mut() {
            Some(sink) => sink.write(&self.buffer),
            None => return Err(closed()),
        };
        self.buffer.clear();
        match result {
            Ok(accepted) if accepted == requested => Ok(()),
            Ok(accepted) => Err(self.fail(Failure::ShortWrite {
                requested,
                accepted,
            })),
            Err(e) => Err(self.fail(Failure::Io(e.kind(), e.to_string()))),
        }
    }

    fn fail(&mut self, failure: Failure) -> MuxError {
        let err = failure.to_error();
        log::warn!(target: "recmux", "sink 失败, 后续输出全部放弃: {err}");
        self.failure = Some(failure);
        err
    }
}

impl Drop for IoContext {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for IoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoContext")
            .field("capacity", &self.capacity)
            .field("buffered", &self.buffer.len())
            .field("pos", &self.pos)
            .field("end", &self.end)
            .field("failed", &self.failure.is_some())
            .field("closed", &self.sink.is_none())
            .finish()
    }
}

fn closed() -> MuxError {
    MuxError::InvalidState("I/O 上下文已关闭".into())
}

// ============================================================
// 内置 sink
// ============================================================

#[derive(Debug, Default)]
struct MemoryState {
    data: Vec<u8>,
    pos: usize,
    write_calls: usize,
    seeks: Vec<u64>,
    close_calls: usize,
}

/// 内存 sink
///
/// 可克隆的句柄, 所有克隆共享同一块缓冲区. 交给封装器一份,
/// 自己留一份用于读取结果.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    /// 创建空的内存 sink
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 复制出已写入的数据
    pub fn data(&self) -> Vec<u8> {
        self.lock().data.clone()
    }

    /// 已写入的字节数
    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    /// 是否没有任何数据
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `write` 被调用的次数
    pub fn write_calls(&self) -> usize {
        self.lock().write_calls
    }

    /// 所有 seek 请求的偏移, 按调用顺序
    pub fn seeks(&self) -> Vec<u64> {
        self.lock().seeks.clone()
    }

    /// `close` 被调用的次数
    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }
}

impl Sink for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();
        state.write_calls += 1;
        let pos = state.pos;
        let overlap = state.data.len().saturating_sub(pos).min(buf.len());
        state.data[pos..pos + overlap].copy_from_slice(&buf[..overlap]);
        state.data.extend_from_slice(&buf[overlap..]);
        state.pos += buf.len();
        Ok(buf.len())
    }

    fn seek(&mut self, offset: u64) -> io::Result<u64> {
        let mut state = self.lock();
        state.seeks.push(offset);
        if offset > state.data.len() as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek 超出已写入范围: {offset} > {}", state.data.len()),
            ));
        }
        state.pos = offset as usize;
        Ok(offset)
    }

    fn close(&mut self) {
        self.lock().close_calls += 1;
    }
}

/// 基于 `Write + Seek` 的 sink, 例如文件
pub struct WriterSink<W: Write + Seek + Send> {
    inner: W,
}

impl<W: Write + Seek + Send> WriterSink<W> {
    /// 包装一个写入目标
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl WriterSink<std::fs::File> {
    /// 创建 (或截断) 文件作为输出
    pub fn create(path: impl AsRef<std::path::Path>) -> io::Result<Self> {
        Ok(Self::new(std::fs::File::create(path)?))
    }
}

impl<W: Write + Seek + Send> Sink for WriterSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_all(buf)?;
        Ok(buf.len())
    }

    fn seek(&mut self, offset: u64) -> io::Result<u64> {
        self.inner.seek(SeekFrom::Start(offset))
    }

    fn close(&mut self) {
        if let Err(e) = self.inner.flush() {
            log::warn!(target: "recmux", "关闭输出时 flush 失败: {e}");
        }
    }
}

/// 写回调: 返回接收的字节数, 负数表示失败
pub type WriteCallback = Box<dyn FnMut(&[u8]) -> i64 + Send>;
/// seek 回调: 返回新的位置, 负数表示失败
pub type SeekCallback = Box<dyn FnMut(u64) -> i64 + Send>;
/// 关闭回调
pub type CloseCallback = Box<dyn FnOnce() + Send>;

/// 基于闭包的 sink
pub struct CallbackSink {
    write: WriteCallback,
    seek: SeekCallback,
    on_close: Option<CloseCallback>,
}

impl CallbackSink {
    /// 由写回调和 seek 回调创建
    pub fn new(
        write: impl FnMut(&[u8]) -> i64 + Send + 'static,
        seek: impl FnMut(u64) -> i64 + Send + 'static,
    ) -> Self {
        Self {
            write: Box::new(write),
            seek: Box::new(seek),
            on_close: None,
        }
    }

    /// 设置关闭回调
    pub fn on_close(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }
}

impl Sink for CallbackSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let ret = (self.write)(buf);
        usize::try_from(ret).map_err(|_| io::Error::other(format!("写回调失败: {ret}")))
    }

    fn seek(&mut self, offset: u64) -> io::Result<u64> {
        let ret = (self.seek)(offset);
        u64::try_from(ret).map_err(|_| io::Error::other(format!("seek 回调失败: {ret}")))
    }

    fn close(&mut self) {
        if let Some(f) = self.on_close.take() {
            f();
        }
    }
}
