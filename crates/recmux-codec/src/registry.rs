//! 编码器注册表.
//!
//! 对标 FFmpeg 的 `avcodec_find_encoder`, 按 CodecId 查找并实例化编码器.

use std::collections::HashMap;

use recmux_core::{MuxError, MuxResult};

use crate::codec_id::CodecId;
use crate::encoder::Encoder;

/// 编码器工厂函数类型
pub type EncoderFactory = fn() -> MuxResult<Box<dyn Encoder>>;

/// 编码器注册条目
struct EncoderEntry {
    /// 编码器名称
    name: String,
    /// 工厂函数
    factory: EncoderFactory,
}

/// 编码器注册表
#[derive(Default)]
pub struct CodecRegistry {
    /// 编码器工厂映射, 每个 CodecId 下按注册顺序排列
    encoders: HashMap<CodecId, Vec<EncoderEntry>>,
}

impl CodecRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建并注册全部内置编码器的注册表
    pub fn with_builtin() -> Self {
        let mut reg = Self::new();
        crate::register_all(&mut reg);
        reg
    }

    /// 注册一个编码器
    pub fn register_encoder(
        &mut self,
        codec_id: CodecId,
        name: impl Into<String>,
        factory: EncoderFactory,
    ) {
        self.encoders
            .entry(codec_id)
            .or_default()
            .push(EncoderEntry {
                name: name.into(),
                factory,
            });
    }

    /// 创建指定 CodecId 的编码器实例, 使用最先注册的实现
    pub fn create_encoder(&self, codec_id: CodecId) -> MuxResult<Box<dyn Encoder>> {
        let entry = self
            .encoders
            .get(&codec_id)
            .and_then(|entries| entries.first())
            .ok_or_else(|| MuxError::Unsupported(format!("未找到 {codec_id} 的编码器")))?;
        log::debug!(target: "recmux", "创建编码器: {}", entry.name);
        (entry.factory)()
    }

    /// 获取所有已注册的编码器名称
    pub fn list_encoders(&self) -> Vec<(CodecId, &str)> {
        let mut result: Vec<(CodecId, &str)> = self
            .encoders
            .iter()
            .flat_map(|(id, entries)| entries.iter().map(move |e| (*id, e.name.as_str())))
            .collect();
        result.sort_by(|a, b| a.1.cmp(b.1));
        result
    }
}
