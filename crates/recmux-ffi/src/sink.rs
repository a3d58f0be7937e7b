//! C 回调 sink.

use std::io;
use std::os::raw::{c_int, c_void};

use recmux_format::Sink;

/// 写回调: 返回接收的字节数, 负数表示失败
pub type RecmuxWriteFn = unsafe extern "C" fn(opaque: *mut c_void, buf: *const u8, len: c_int) -> c_int;
/// seek 回调: 定位到绝对偏移, 返回新位置, 负数表示失败
pub type RecmuxSeekFn = unsafe extern "C" fn(opaque: *mut c_void, offset: i64) -> i64;
/// 释放回调: 会话释放时调用一次, 用于释放 `opaque` 背后的对象引用
pub type RecmuxReleaseFn = unsafe extern "C" fn(opaque: *mut c_void);

/// 调用方提供的字节输出目标
///
/// `write` 和 `seek` 必须非空. 所有回调都在调用 recmux 函数的线程上同步执行.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RecmuxSink {
    /// 回调的第一个参数, recmux 不解引用
    pub opaque: *mut c_void,
    /// 写回调
    pub write: Option<RecmuxWriteFn>,
    /// seek 回调
    pub seek: Option<RecmuxSeekFn>,
    /// 释放回调 (可选)
    pub release: Option<RecmuxReleaseFn>,
}

/// 解析完成的 C sink, 回调在创建时检查一次
pub(crate) struct FfiSink {
    opaque: *mut c_void,
    write: RecmuxWriteFn,
    seek: RecmuxSeekFn,
    release: Option<RecmuxReleaseFn>,
}

// SAFETY: 会话只在单个线程上顺序使用; 调用方保证 opaque 可以在
// 调用 recmux 函数的线程上访问.
unsafe impl Send for FfiSink {}

impl FfiSink {
    /// 检查回调, `write` 或 `seek` 为空时返回 `None`
    pub(crate) fn new(sink: &RecmuxSink) -> Option<Self> {
        Some(Self {
            opaque: sink.opaque,
            write: sink.write?,
            seek: sink.seek?,
            release: sink.release,
        })
    }
}

impl Sink for FfiSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let len = c_int::try_from(buf.len())
            .map_err(|_| io::Error::other(format!("单次写入过大: {} 字节", buf.len())))?;
        // SAFETY: buf 在调用期间有效, 长度与 len 一致
        let ret = unsafe { (self.write)(self.opaque, buf.as_ptr(), len) };
        usize::try_from(ret).map_err(|_| io::Error::other(format!("sink 写回调返回 {ret}")))
    }

    fn seek(&mut self, offset: u64) -> io::Result<u64> {
        let offset = i64::try_from(offset)
            .map_err(|_| io::Error::other(format!("seek 偏移过大: {offset}")))?;
        // SAFETY: 回调由调用方提供, opaque 原样传回
        let ret = unsafe { (self.seek)(self.opaque, offset) };
        u64::try_from(ret).map_err(|_| io::Error::other(format!("sink seek 回调返回 {ret}")))
    }

    fn close(&mut self) {
        if let Some(release) = self.release.take() {
            // SAFETY: 只调用一次, 之后不再使用 opaque
            unsafe { release(self.opaque) };
        }
    }
}
