//! 统一错误类型定义.
//!
//! 所有 recmux crate 共用的错误类型. 每个错误都能折算为一个负数结果码,
//! 供 C ABI 等不能传播 `Result` 的边界直接返回.

use std::fmt;

use thiserror::Error;

/// 结果码: 无效参数 (EINVAL)
pub const CODE_INVALID_ARGUMENT: i32 = -22;
/// 结果码: 生命周期状态不允许该操作 (EPERM)
pub const CODE_INVALID_STATE: i32 = -1;
/// 结果码: 内存分配失败 (ENOMEM)
pub const CODE_OUT_OF_MEMORY: i32 = -12;
/// 结果码: I/O 失败 (EIO)
pub const CODE_IO: i32 = -5;
/// 结果码: 不支持的操作 (ENOSYS)
pub const CODE_UNSUPPORTED: i32 = -38;
/// 结果码: 无效数据, 与 FFmpeg 的 `AVERROR_INVALIDDATA` 取值一致
pub const CODE_INVALID_DATA: i32 = -1_094_995_529;
/// 结果码: 其他内部错误 (ENOENT)
pub const CODE_INTERNAL: i32 = -2;

/// 封装流程中可能失败的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuxStage {
    /// 写入容器头部
    Header,
    /// 写入数据包
    Packet,
    /// 写入容器尾部
    Trailer,
}

impl fmt::Display for MuxStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Header => "头部",
            Self::Packet => "数据包",
            Self::Trailer => "尾部",
        };
        write!(f, "{name}")
    }
}

/// recmux 统一错误类型
#[derive(Debug, Error)]
pub enum MuxError {
    /// 无效参数 (越界的轨道索引, 非法的编码参数等)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 当前生命周期状态不允许该操作
    #[error("状态错误: {0}")]
    InvalidState(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 无效数据 (损坏的码流, sink 回显了错误的偏移等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内存分配失败
    #[error("内存分配失败: {0}")]
    OutOfMemory(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// sink 接收的字节数少于提交的字节数
    #[error("写入不完整: 提交 {requested} 字节, sink 仅接收 {accepted} 字节")]
    ShortWrite {
        /// 提交的字节数
        requested: usize,
        /// sink 报告接收的字节数
        accepted: usize,
    },

    /// 容器写入阶段失败
    #[error("写入{stage}失败: {source}")]
    Mux {
        /// 失败的阶段
        stage: MuxStage,
        /// 底层错误
        #[source]
        source: Box<MuxError>,
    },

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl MuxError {
    /// 将错误包装为指定阶段的封装错误
    ///
    /// 已经是封装错误时保持原样, 不重复嵌套.
    pub fn at_stage(self, stage: MuxStage) -> Self {
        match self {
            Self::Mux { .. } => self,
            other => Self::Mux {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// 封装错误对应的阶段
    pub fn stage(&self) -> Option<MuxStage> {
        match self {
            Self::Mux { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// 负数结果码
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => CODE_INVALID_ARGUMENT,
            Self::InvalidState(_) => CODE_INVALID_STATE,
            Self::Unsupported(_) => CODE_UNSUPPORTED,
            Self::InvalidData(_) => CODE_INVALID_DATA,
            Self::OutOfMemory(_) => CODE_OUT_OF_MEMORY,
            Self::Io(_) | Self::ShortWrite { .. } => CODE_IO,
            Self::Mux { source, .. } => source.code(),
            Self::Internal(_) => CODE_INTERNAL,
        }
    }
}

/// recmux 统一 Result 类型
pub type MuxResult<T> = Result<T, MuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_negative() {
        let errors = [
            MuxError::InvalidArgument("x".into()),
            MuxError::InvalidState("x".into()),
            MuxError::Unsupported("x".into()),
            MuxError::InvalidData("x".into()),
            MuxError::OutOfMemory("x".into()),
            MuxError::ShortWrite {
                requested: 8,
                accepted: 4,
            },
            MuxError::Internal("x".into()),
        ];
        for err in &errors {
            assert!(err.code() < 0, "{err} 应为负数结果码");
        }
    }

    #[test]
    fn test_stage_wrap_keeps_source_code() {
        let err = MuxError::ShortWrite {
            requested: 8,
            accepted: 0,
        }
        .at_stage(MuxStage::Header);
        assert_eq!(err.stage(), Some(MuxStage::Header));
        assert_eq!(err.code(), CODE_IO);

        // 重复包装不改变阶段
        let err = err.at_stage(MuxStage::Trailer);
        assert_eq!(err.stage(), Some(MuxStage::Header));
    }

    #[test]
    fn test_display_names_stage() {
        let err = MuxError::InvalidData("dts".into()).at_stage(MuxStage::Packet);
        assert_eq!(format!("{err}"), "写入数据包失败: 无效数据: dts");
    }
}
