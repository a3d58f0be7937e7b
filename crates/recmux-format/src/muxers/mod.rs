//! 封装器实现.

pub mod mp4;

use crate::format_id::FormatId;
use crate::registry::FormatRegistry;

/// 注册所有内置封装器
pub fn register_all_muxers(registry: &mut FormatRegistry) {
    registry.register_muxer(FormatId::Mp4, "mp4", mp4::Mp4Muxer::create);
}
