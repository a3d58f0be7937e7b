//! # recmux-codec
//!
//! recmux 编码器参数协商与码流工具库.
//!
//! 本 crate 对标 FFmpeg 的 libavcodec 中封装流程依赖的部分: 编解码器标识,
//! 编码参数, 压缩数据包, 以及轨道注册时用来确定音频参数的编码器协商.
//! 封装器从不编码采样, 编码器只负责校验参数并给出容器需要的 extradata.
//!
//! ## 码流工具
//!
//! - **H.264**: Annex B 分割, Annex B → AVCC 转换, avcC 记录构建
//! - **AAC**: ADTS 头部解析, AudioSpecificConfig 构建
//!
//! ## 使用示例
//!
//! ```rust
//! use recmux_codec::{CodecId, CodecRegistry};
//!
//! let mut reg = CodecRegistry::new();
//! recmux_codec::register_all(&mut reg);
//!
//! let encoder = reg.create_encoder(CodecId::Aac).unwrap();
//! assert_eq!(encoder.name(), "aac");
//! ```

pub mod codec_id;
pub mod codec_parameters;
pub mod encoder;
pub mod encoders;
pub mod packet;
pub mod parsers;
pub mod registry;

// 重导出常用类型
pub use codec_id::CodecId;
pub use codec_parameters::{AudioCodecParams, CodecParameters, CodecParamsType, VideoCodecParams};
pub use encoder::Encoder;
pub use packet::Packet;
pub use registry::CodecRegistry;

/// 注册所有内置编码器
pub fn register_all(registry: &mut CodecRegistry) {
    encoders::register_all_encoders(registry);
}
