//! 历史日志维护: 过期删除与 gzip 压缩.

use super::{LoggingConfig, build_log_path};
use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// 清理日志目录
///
/// 早于保留期限的文件被删除; 开启压缩时, 今天之前的 `.log` 文件被压缩为 `.log.gz`.
/// 单个文件处理失败只记录日志, 不影响其余文件.
pub(super) fn cleanup_logs(config: &LoggingConfig, today: NaiveDate) -> Result<()> {
    let Some(directory) = config.directory.as_deref().map(Path::new) else {
        return Ok(());
    };
    if !directory.exists() {
        return Ok(());
    }

    let cutoff = today - ChronoDuration::days(config.retention_days);
    let current = build_log_path(directory, &config.file_prefix, today);

    for entry in fs::read_dir(directory)
        .with_context(|| format!("读取日志目录失败, path={}", directory.display()))?
    {
        let path = entry?.path();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some((date, compressed)) = parse_log_name(&file_name, &config.file_prefix) else {
            continue;
        };

        if date < cutoff {
            if let Err(err) = fs::remove_file(&path) {
                tracing::warn!("删除过期日志失败, path={}: {}", path.display(), err);
            }
            continue;
        }

        if config.compress_history && !compressed && path != current && date < today {
            if let Err(err) = compress_to_gz(&path) {
                tracing::warn!("压缩历史日志失败: {:#}", err);
            }
        }
    }

    Ok(())
}

fn compress_to_gz(path: &Path) -> Result<()> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    if gz_path.exists() {
        return Ok(());
    }

    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;

    fs::remove_file(path)
        .with_context(|| format!("删除已压缩日志失败, path={}", path.display()))?;
    Ok(())
}

/// 解析 `{prefix}.{YYYY-MM-DD}.log[.gz]`, 返回日期与是否已压缩
fn parse_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let rest = file_name.strip_prefix(prefix)?.strip_prefix('.')?;
    let (date_part, compressed) = match rest.strip_suffix(".log.gz") {
        Some(d) => (d, true),
        None => (rest.strip_suffix(".log")?, false),
    };
    if date_part.len() != 10 {
        return None;
    }
    let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
    Some((date, compressed))
}
