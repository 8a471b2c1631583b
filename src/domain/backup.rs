//! 备份相关领域模型
//!
//! 备份文件命名：`postgres_<db>_<YYYYMMDD_HHMMSS>.sql`

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// 文件名前缀
pub const ARTIFACT_PREFIX: &str = "postgres";

/// 文件扩展名
pub const ARTIFACT_EXTENSION: &str = "sql";

/// 时间戳格式（秒级）
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// 写入中的临时文件后缀
pub const PARTIAL_SUFFIX: &str = "partial";

/// 数据库凭据
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub user: String,
    pub password: String,
    pub database: String,
}

impl std::fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}

/// 生成备份文件名
pub fn artifact_file_name(database: &str, at: NaiveDateTime) -> String {
    format!(
        "{}_{}_{}.{}",
        ARTIFACT_PREFIX,
        database,
        at.format(TIMESTAMP_FORMAT),
        ARTIFACT_EXTENSION
    )
}

/// 解析属于 `database` 的备份文件名，返回其时间戳
///
/// 前缀、后缀与时间戳都必须精确匹配，`postgres_foo_bar_...` 不属于 `foo`。
pub fn parse_artifact_file_name(database: &str, file_name: &str) -> Option<NaiveDateTime> {
    let prefix = format!("{}_{}_", ARTIFACT_PREFIX, database);
    let suffix = format!(".{}", ARTIFACT_EXTENSION);

    let stamp = file_name.strip_prefix(&prefix)?.strip_suffix(&suffix)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

/// 一次备份产出的文件
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupArtifact {
    /// 最终路径
    pub path: PathBuf,
}

impl BackupArtifact {
    pub fn new(dir: &Path, database: &str, at: NaiveDateTime) -> Self {
        Self {
            path: dir.join(artifact_file_name(database, at)),
        }
    }

    /// 写入中使用的临时路径，不匹配备份命名规则
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(PARTIAL_SUFFIX);
        PathBuf::from(name)
    }
}

/// 备份目录中的已有文件
#[derive(Clone, Debug, Serialize)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    /// 距今秒数
    pub age_secs: u64,
}
