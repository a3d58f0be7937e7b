//! 编码器实现模块.

pub mod aac;

use crate::codec_id::CodecId;
use crate::registry::CodecRegistry;

/// 注册所有内置编码器
pub fn register_all_encoders(registry: &mut CodecRegistry) {
    registry.register_encoder(CodecId::Aac, "aac", aac::AacEncoder::create);
}
