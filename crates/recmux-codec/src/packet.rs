//! 压缩数据包 (Packet).
//!
//! 对标 FFmpeg 的 `AVPacket`: 一个已编码的访问单元 (一帧视频或一帧 AAC),
//! 时间戳已换算到所属轨道的时间基.

use bytes::Bytes;
use recmux_core::Rational;
use recmux_core::timestamp::NOPTS_VALUE;

/// 压缩数据包
#[derive(Debug, Clone)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 解码时间戳 (DTS)
    pub dts: i64,
    /// 数据包时长 (以 time_base 为单位, 0 表示未知)
    pub duration: i64,
    /// 时间基
    pub time_base: Rational,
    /// 所属流的索引
    pub stream_index: usize,
    /// 是否为关键帧
    pub is_keyframe: bool,
}

impl Packet {
    /// 从数据创建数据包, 时间戳未定义
    pub fn new(stream_index: usize, data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            duration: 0,
            time_base: Rational::UNDEFINED,
            stream_index,
            is_keyframe: false,
        }
    }

    /// 设置 PTS 与 DTS (录制场景无 B 帧, 两者相同)
    pub fn with_timestamp(mut self, ts: i64, time_base: Rational) -> Self {
        self.pts = ts;
        self.dts = ts;
        self.time_base = time_base;
        self
    }

    /// 设置关键帧标志
    pub fn with_keyframe(mut self, is_keyframe: bool) -> Self {
        self.is_keyframe = is_keyframe;
        self
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
