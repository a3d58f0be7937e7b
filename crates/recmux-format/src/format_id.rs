//! 容器格式标识符.
//!
//! 对标 FFmpeg 的输出格式名称 (`AVOutputFormat::name`).

use std::fmt;

/// 容器格式标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FormatId {
    /// MPEG-4 Part 14 (MP4)
    Mp4,
}

impl FormatId {
    /// 所有已知格式标识的列表
    pub const ALL: &[FormatId] = &[Self::Mp4];

    /// 格式短名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
        }
    }

    /// 格式的完整名称
    pub const fn long_name(&self) -> &'static str {
        match self {
            Self::Mp4 => "MP4 (MPEG-4 Part 14)",
        }
    }

    /// 格式常用的文件扩展名
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Mp4 => &["mp4", "m4v", "m4a"],
        }
    }

    /// MIME 类型
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
        }
    }

    /// 根据短名称查找格式 (不区分大小写)
    pub fn from_name(name: &str) -> Option<FormatId> {
        Self::ALL
            .iter()
            .find(|id| id.name().eq_ignore_ascii_case(name))
            .copied()
    }

    /// 根据文件扩展名猜测格式
    ///
    /// # 参数
    /// - `ext`: 文件扩展名 (不含 `.`, 如 "mp4")
    pub fn from_extension(ext: &str) -> Option<FormatId> {
        let ext_lower = ext.to_lowercase();
        Self::ALL
            .iter()
            .find(|id| id.extensions().contains(&ext_lower.as_str()))
            .copied()
    }

    /// 从文件路径猜测格式
    pub fn from_filename(filename: &str) -> Option<FormatId> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::from_extension(ext)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
