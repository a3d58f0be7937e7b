//! H.264/AVC 码流工具.
//!
//! 编码器通常输出 Annex B 码流, MP4 采样则要求 4 字节长度前缀 (AVCC),
//! 参数集 (SPS/PPS) 放入 `avcC` 记录而不是采样数据.

pub mod nal;
pub mod sps;

pub use nal::{
    NalUnit, NalUnitType, ParameterSets, annex_b_to_avcc, build_avcc_config, is_annex_b,
    split_annex_b, split_avcc,
};
pub use sps::{SpsHead, parse_sps_head};
