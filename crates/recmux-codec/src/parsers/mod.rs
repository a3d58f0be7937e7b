//! 码流解析工具.
//!
//! - `h264`: Annex B 分割, AVCC 转换, avcC 记录构建
//! - `adts`: AAC ADTS 帧头解析与 AudioSpecificConfig 构建

pub mod adts;
pub mod h264;
