//! 封装会话配置.

use serde::{Deserialize, Serialize};

use crate::io::DEFAULT_BUFFER_SIZE;

/// 单个数据包写入失败后的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketErrorPolicy {
    /// 丢弃该数据包并记录日志, 会话继续
    #[default]
    Drop,
    /// 会话进入失败状态, 后续只能释放
    Abort,
}

/// 封装会话配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxOptions {
    /// I/O 中间缓冲区大小 (字节), 必须大于 0
    pub io_buffer_size: usize,
    /// 数据包写入失败策略
    pub packet_error_policy: PacketErrorPolicy,
    /// 输出格式短名称
    pub format: String,
}

impl Default for MuxOptions {
    fn default() -> Self {
        Self {
            io_buffer_size: DEFAULT_BUFFER_SIZE,
            packet_error_policy: PacketErrorPolicy::Drop,
            format: "mp4".into(),
        }
    }
}
