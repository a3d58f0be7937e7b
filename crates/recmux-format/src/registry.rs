//! 容器格式注册表.
//!
//! 管理已注册的封装器, 对标 FFmpeg 的 `av_guess_format`.

use std::collections::HashMap;

use recmux_core::{MuxError, MuxResult};

use crate::format_id::FormatId;
use crate::muxer::Muxer;

/// 封装器工厂函数类型
pub type MuxerFactory = fn() -> MuxResult<Box<dyn Muxer>>;

/// 封装器注册条目
struct MuxerEntry {
    /// 格式名称
    name: String,
    /// 工厂函数
    factory: MuxerFactory,
}

/// 容器格式注册表
#[derive(Default)]
pub struct FormatRegistry {
    /// 封装器工厂映射
    muxers: HashMap<FormatId, MuxerEntry>,
}

impl FormatRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建并注册全部内置封装器的注册表
    pub fn with_builtin() -> Self {
        let mut reg = Self::new();
        crate::register_all(&mut reg);
        reg
    }

    /// 注册一个封装器, 同一格式后注册的覆盖先注册的
    pub fn register_muxer(
        &mut self,
        format_id: FormatId,
        name: impl Into<String>,
        factory: MuxerFactory,
    ) {
        self.muxers.insert(
            format_id,
            MuxerEntry {
                name: name.into(),
                factory,
            },
        );
    }

    /// 创建指定格式的封装器实例
    pub fn create_muxer(&self, format_id: FormatId) -> MuxResult<Box<dyn Muxer>> {
        let entry = self
            .muxers
            .get(&format_id)
            .ok_or_else(|| MuxError::Unsupported(format!("未找到 {format_id} 的封装器")))?;
        (entry.factory)()
    }

    /// 按短名称或文件名猜测输出格式, 只返回已注册封装器的格式
    ///
    /// 短名称优先, 其次是文件扩展名.
    pub fn guess_format(&self, short_name: Option<&str>, filename: Option<&str>) -> Option<FormatId> {
        let by_name = short_name.and_then(FormatId::from_name);
        let by_file = || filename.and_then(FormatId::from_filename);
        by_name
            .or_else(by_file)
            .filter(|id| self.muxers.contains_key(id))
    }

    /// 获取所有已注册的封装器名称
    pub fn list_muxers(&self) -> Vec<(FormatId, &str)> {
        self.muxers
            .iter()
            .map(|(id, entry)| (*id, entry.name.as_str()))
            .collect()
    }
}
