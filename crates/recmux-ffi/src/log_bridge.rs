//! 把 `log` 记录转发给调用方的 C 日志回调.
//!
//! 优先级沿用 Android 日志的取值 (VERBOSE=2 .. ERROR=6), tag 固定为 `recmux`.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{Level, LevelFilter, Log, Metadata, Record};

/// 日志回调: (优先级, tag, 消息), 字符串只在回调期间有效
pub type RecmuxLogFn = unsafe extern "C" fn(priority: c_int, tag: *const c_char, message: *const c_char);

/// 当前安装的回调
static CALLBACK: RwLock<Option<RecmuxLogFn>> = RwLock::new(None);

static LOGGER: CallbackLogger = CallbackLogger;

/// 本模块的 logger 是否已成为全局 logger
static INSTALLED: AtomicBool = AtomicBool::new(false);

struct CallbackLogger;

impl Log for CallbackLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let callback = match CALLBACK.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        let Some(callback) = callback else {
            return;
        };

        let text = record.args().to_string().replace('\0', " ");
        let Ok(message) = CString::new(text) else {
            return;
        };
        // SAFETY: tag 与 message 在调用期间有效
        unsafe { callback(priority_for(record.level()), c"recmux".as_ptr(), message.as_ptr()) };
    }

    fn flush(&self) {}
}

/// 日志级别对应的回调优先级
pub(crate) fn priority_for(level: Level) -> c_int {
    match level {
        Level::Error => 6,
        Level::Warn => 5,
        Level::Info => 4,
        Level::Debug => 3,
        Level::Trace => 2,
    }
}

/// 回调优先级对应的最详细日志级别
pub(crate) fn level_filter_for(priority: c_int) -> LevelFilter {
    match priority {
        i32::MIN..=2 => LevelFilter::Trace,
        3 => LevelFilter::Debug,
        4 => LevelFilter::Info,
        5 => LevelFilter::Warn,
        6 => LevelFilter::Error,
        _ => LevelFilter::Off,
    }
}

/// 安装或移除回调
///
/// 宿主进程已经安装了别的 `log` 实现时, 回调不会收到任何记录.
pub(crate) fn install(callback: Option<RecmuxLogFn>, min_priority: c_int) {
    match CALLBACK.write() {
        Ok(mut guard) => *guard = callback,
        Err(poisoned) => *poisoned.into_inner() = callback,
    }
    if callback.is_none() {
        return;
    }
    if log::set_logger(&LOGGER).is_ok() {
        INSTALLED.store(true, Ordering::Release);
    }
    if INSTALLED.load(Ordering::Acquire) {
        log::set_max_level(level_filter_for(min_priority));
    }
}
