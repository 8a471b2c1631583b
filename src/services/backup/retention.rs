//! 备份保留策略
//!
//! 只处理属于当前数据库的备份文件；年龄 = 当前时间 − 修改时间，
//! 严格大于保留窗口的文件被删除。

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::backup::{parse_artifact_file_name, ArtifactInfo};

/// 扫描备份目录，返回属于 `database` 的文件（按修改时间从新到旧）
pub fn scan(dir: &Path, database: &str, now: SystemTime) -> std::io::Result<Vec<ArtifactInfo>> {
    let mut artifacts = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if parse_artifact_file_name(database, &file_name).is_none() {
            continue;
        }

        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata.modified()?;
        // 修改时间在未来时按 0 处理
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);

        artifacts.push(ArtifactInfo {
            path: entry.path(),
            file_name,
            size_bytes: metadata.len(),
            modified_at: DateTime::<Utc>::from(modified),
            age_secs: age.as_secs(),
        });
    }

    artifacts.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
    Ok(artifacts)
}

/// 删除超过 `max_age` 的备份，`keep` 指定的文件始终保留
///
/// 返回被删除的路径。
pub fn sweep(
    dir: &Path,
    database: &str,
    max_age: Duration,
    keep: Option<&Path>,
    now: SystemTime,
) -> std::io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if keep.is_some_and(|k| k == path) {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if parse_artifact_file_name(database, &file_name).is_none() {
            continue;
        }

        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let age = now
            .duration_since(metadata.modified()?)
            .unwrap_or(Duration::ZERO);
        if age > max_age {
            debug!(path = %path.display(), age = ?age, "Removing expired backup");
            std::fs::remove_file(&path)?;
            removed.push(path);
        }
    }

    info!(removed = removed.len(), max_age_secs = max_age.as_secs(), "Retention sweep finished");
    Ok(removed)
}
