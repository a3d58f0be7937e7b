//! # recmux-ffi
//!
//! recmux C FFI 导出层.
//!
//! 把 [`FormatContext`] 的七个操作导出为 C 函数, 供 C/C++ 或 JNI 桥接层调用.
//! 输出字节全部经由调用方提供的 [`RecmuxSink`] 回调离开.
//!
//! # 命名规范
//!
//! 所有导出函数以 `recmux_` 前缀命名.
//!
//! # 返回值
//!
//! 返回 `c_int` 的函数成功时返回非负值, 失败时返回负数结果码
//! (见 `recmux_core::error` 中的 `CODE_*`). 数据包与尾部写入没有返回值,
//! 失败只记录日志. 任何 panic 都在边界处被截住, 不会传播到调用方.
//!
//! # 内存管理
//!
//! - `recmux_context_alloc` 返回的上下文必须且只能由 `recmux_release` 释放一次
//! - 数据包缓冲区在 `recmux_write_packet` 返回后即可复用

mod log_bridge;
mod sink;

use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};

use recmux_core::error::{CODE_INTERNAL, CODE_INVALID_ARGUMENT};
use recmux_core::{MuxError, MuxResult};
use recmux_format::FormatContext;

pub use log_bridge::RecmuxLogFn;
pub use sink::{RecmuxReleaseFn, RecmuxSeekFn, RecmuxSink, RecmuxWriteFn};

use sink::FfiSink;

/// 不透明的封装会话句柄
pub struct RecmuxContext {
    inner: FormatContext,
}

/// 获取 recmux 版本号字符串
///
/// 返回的字符串指针为静态分配, 无需释放.
#[unsafe(no_mangle)]
pub extern "C" fn recmux_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast()
}

/// 设置日志回调
///
/// `min_priority` 为需要转发的最低优先级 (2=VERBOSE .. 6=ERROR).
/// 传入空回调停止转发. 宿主进程已经安装了其他 `log` 实现时回调收不到记录.
#[unsafe(no_mangle)]
pub extern "C" fn recmux_set_log_callback(callback: Option<RecmuxLogFn>, min_priority: c_int) {
    guard((), || log_bridge::install(callback, min_priority));
}

/// 创建封装会话
///
/// `write` 或 `seek` 为空, 或者分配失败时返回空指针; 此时 `release`
/// 回调不会被调用, `opaque` 仍归调用方所有.
#[unsafe(no_mangle)]
pub extern "C" fn recmux_context_alloc(sink: RecmuxSink) -> *mut RecmuxContext {
    guard(std::ptr::null_mut(), || {
        let Some(sink) = FfiSink::new(&sink) else {
            log::error!(target: "recmux", "创建封装会话失败: sink 缺少 write 或 seek 回调");
            return std::ptr::null_mut();
        };
        match FormatContext::create(sink) {
            Ok(inner) => Box::into_raw(Box::new(RecmuxContext { inner })),
            Err(e) => {
                log::error!(target: "recmux", "创建封装会话失败: code={}, {e}", e.code());
                std::ptr::null_mut()
            }
        }
    })
}

/// 添加音频轨道, 返回轨道索引或负数结果码
///
/// # Safety
///
/// `ctx` 必须为空或由 `recmux_context_alloc` 返回且尚未释放.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn recmux_add_audio_track(
    ctx: *mut RecmuxContext,
    bit_rate: c_int,
    sample_rate: c_int,
    channels: c_int,
) -> c_int {
    // SAFETY: 由调用方保证
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return CODE_INVALID_ARGUMENT;
    };
    guard(CODE_INTERNAL, || {
        to_code(
            (|| {
                let index = ctx.inner.add_audio_track(
                    u64::from(non_negative(bit_rate, "码率")?),
                    non_negative(sample_rate, "采样率")?,
                    non_negative(channels, "声道数")?,
                )?;
                Ok(index as c_int)
            })(),
            "添加音频轨道",
        )
    })
}

/// 添加视频轨道, 返回轨道索引或负数结果码
///
/// `orientation_hint` 非 0 时写入对应角度的显示矩阵.
///
/// # Safety
///
/// `ctx` 必须为空或由 `recmux_context_alloc` 返回且尚未释放.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn recmux_add_video_track(
    ctx: *mut RecmuxContext,
    bit_rate: c_int,
    frame_rate: c_int,
    width: c_int,
    height: c_int,
    orientation_hint: c_int,
) -> c_int {
    // SAFETY: 由调用方保证
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return CODE_INVALID_ARGUMENT;
    };
    guard(CODE_INTERNAL, || {
        to_code(
            (|| {
                let index = ctx.inner.add_video_track(
                    u64::from(non_negative(bit_rate, "码率")?),
                    non_negative(frame_rate, "帧率")?,
                    non_negative(width, "宽度")?,
                    non_negative(height, "高度")?,
                    orientation_hint,
                )?;
                Ok(index as c_int)
            })(),
            "添加视频轨道",
        )
    })
}

/// 写入容器头部, 成功返回 0, 失败返回负数结果码
///
/// # Safety
///
/// `ctx` 必须为空或由 `recmux_context_alloc` 返回且尚未释放.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn recmux_write_headers(ctx: *mut RecmuxContext) -> c_int {
    // SAFETY: 由调用方保证
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return CODE_INVALID_ARGUMENT;
    };
    guard(CODE_INTERNAL, || {
        match ctx.inner.write_header() {
            Ok(()) => 0,
            // 失败已由会话记录
            Err(e) => e.code(),
        }
    })
}

/// 写入一个压缩帧, 失败只记录日志
///
/// # Safety
///
/// - `ctx` 必须为空或由 `recmux_context_alloc` 返回且尚未释放
/// - `size > 0` 时 `data` 必须指向至少 `size` 字节的可读内存
#[unsafe(no_mangle)]
pub unsafe extern "C" fn recmux_write_packet(
    ctx: *mut RecmuxContext,
    data: *const u8,
    size: c_int,
    pts_micros: i64,
    track_index: c_int,
    is_keyframe: bool,
) {
    // SAFETY: 由调用方保证
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return;
    };
    let payload: &[u8] = match (data.is_null(), usize::try_from(size)) {
        (_, Ok(0)) => &[],
        // SAFETY: 由调用方保证 data 指向 size 字节
        (false, Ok(len)) => unsafe { std::slice::from_raw_parts(data, len) },
        _ => {
            log::error!(target: "recmux", "写入数据包失败: 无效的缓冲区 (size={size})");
            return;
        }
    };
    let Ok(track_index) = usize::try_from(track_index) else {
        log::error!(target: "recmux", "写入数据包失败: 轨道索引 {track_index} 无效");
        return;
    };
    guard((), || {
        if let Err(MuxError::InvalidState(msg) | MuxError::InvalidArgument(msg)) =
            ctx.inner.write_packet(track_index, payload, pts_micros, is_keyframe)
        {
            // 封装器错误已由会话记录, 这里只补记调用错误
            log::error!(target: "recmux", "写入数据包失败: {msg}");
        }
    });
}

/// 写入容器尾部, 失败只记录日志
///
/// # Safety
///
/// `ctx` 必须为空或由 `recmux_context_alloc` 返回且尚未释放.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn recmux_write_trailer(ctx: *mut RecmuxContext) {
    // SAFETY: 由调用方保证
    let Some(ctx) = (unsafe { ctx.as_mut() }) else {
        return;
    };
    guard((), || {
        if let Err(MuxError::InvalidState(msg)) = ctx.inner.write_trailer() {
            log::error!(target: "recmux", "写入尾部失败: {msg}");
        }
    });
}

/// 释放封装会话, 调用 sink 的 `release` 回调
///
/// # Safety
///
/// `ctx` 必须为空或由 `recmux_context_alloc` 返回且尚未释放; 之后不能再使用.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn recmux_release(ctx: *mut RecmuxContext) {
    if ctx.is_null() {
        return;
    }
    // SAFETY: 由调用方保证指针来自 Box::into_raw 且只释放一次
    let ctx = unsafe { Box::from_raw(ctx) };
    guard((), move || ctx.inner.release());
}

// ============================================================
// 内部工具函数
// ============================================================

/// 执行 `f`, 截住 panic 并返回 `default`
fn guard<R>(default: R, f: impl FnOnce() -> R) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => r,
        Err(_) => {
            log::error!(target: "recmux", "FFI 调用内部发生 panic");
            default
        }
    }
}

/// 把结果折算为返回值, 错误记录日志
fn to_code(result: MuxResult<c_int>, op: &str) -> c_int {
    result.unwrap_or_else(|e| {
        log::error!(target: "recmux", "{op}失败: code={}, {e}", e.code());
        e.code()
    })
}

fn non_negative(v: c_int, what: &str) -> MuxResult<u32> {
    u32::try_from(v).map_err(|_| MuxError::InvalidArgument(format!("{what}不能为负数: {v}")))
}
