//! 封装器 (Muxer) trait 定义.
//!
//! 对标 FFmpeg 的 `AVOutputFormat`, 定义了将数据包写入容器格式的接口.

use recmux_codec::Packet;
use recmux_core::MuxResult;

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::stream::Stream;

/// 封装器 trait
///
/// 使用流程:
/// 1. 调用 `write_header()` 写入容器头部, 传入全部输出流
/// 2. 循环调用 `write_packet()` 写入数据包 (时间戳以流的时间基为单位)
/// 3. 调用 `write_trailer()` 写入容器尾部
///
/// 任何一步失败后, 调用方不应再继续调用该实例的后续步骤, 除非错误只涉及
/// 被拒绝的单个数据包.
pub trait Muxer: Send {
    /// 获取格式标识
    fn format_id(&self) -> FormatId;

    /// 获取格式名称
    fn name(&self) -> &str;

    /// 写入容器头部
    fn write_header(&mut self, io: &mut IoContext, streams: &[Stream]) -> MuxResult<()>;

    /// 写入一个数据包
    fn write_packet(&mut self, io: &mut IoContext, packet: &Packet) -> MuxResult<()>;

    /// 写入容器尾部, 完成封装
    fn write_trailer(&mut self, io: &mut IoContext) -> MuxResult<()>;
}
