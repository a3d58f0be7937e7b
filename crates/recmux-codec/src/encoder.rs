//! 编码器 trait 定义.
//!
//! 封装器不编码采样. 编码器在这里只承担 FFmpeg 中 `avcodec_open2` +
//! `avcodec_parameters_from_context` 的职责: 校验并补全轨道参数.

use recmux_core::{MuxResult, SampleFormat};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;

/// 编码器 trait
///
/// 协商流程:
/// 1. 调用 `sample_formats()` 取得支持的输入采样格式
/// 2. 调用 `open()` 提交期望的参数, 编码器负责校验
/// 3. 调用 `parameters()` 取得补全后的参数 (含 extradata, 帧长等)
/// 4. 丢弃编码器实例
pub trait Encoder: Send {
    /// 获取编码器标识
    fn codec_id(&self) -> CodecId;

    /// 获取编码器名称
    fn name(&self) -> &str;

    /// 支持的输入采样格式, 第一个为首选格式. 视频编码器返回空列表.
    fn sample_formats(&self) -> &[SampleFormat] {
        &[]
    }

    /// 使用参数打开编码器
    fn open(&mut self, params: &CodecParameters) -> MuxResult<()>;

    /// 打开后由编码器补全的参数
    fn parameters(&self) -> MuxResult<CodecParameters>;
}
