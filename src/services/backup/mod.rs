//! 数据库备份
//!
//! 流程：确保目录存在 → 加锁 → pg_dump 写入临时文件 → 原子重命名 → 清理过期备份。
//! 同时提供备份列表与恢复。

pub mod lock;
pub mod retention;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::Local;
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, warn};

use crate::config::BackupConfig;
use crate::domain::backup::{parse_artifact_file_name, ArtifactInfo, BackupArtifact};
use crate::infra::{CommandError, CommandRunner, ComposeCli, DatabaseDumps};

pub use lock::BackupLock;

/// 备份错误
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to create backup directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "another backup is already running (lock {} held by pid {})",
        path.display(),
        describe_holder(.holder)
    )]
    Locked { path: PathBuf, holder: Option<u32> },

    #[error("failed to acquire backup lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database dump failed: {0}")]
    Dump(#[source] CommandError),

    #[error("failed to finalize backup {}: {source}", path.display())]
    Finalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("retention sweep failed: {0}")]
    Sweep(#[source] std::io::Error),

    #[error("failed to scan backup directory {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backup file {} not found", path.display())]
    MissingInput { path: PathBuf },

    #[error("database restore failed: {0}")]
    Restore(#[source] CommandError),

    #[error("background task failed: {0}")]
    Task(String),
}

fn describe_holder(holder: &Option<u32>) -> String {
    holder
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl BackupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            BackupError::Dump(e) | BackupError::Restore(e) => e.exit_code(),
            _ => 1,
        }
    }
}

/// 一次备份的结果
#[derive(Clone, Debug)]
pub struct BackupReport {
    /// 新生成的备份文件
    pub artifact: PathBuf,
    pub size_bytes: u64,
    /// 被清理的过期备份
    pub removed: Vec<PathBuf>,
}

/// 备份管理器
pub struct BackupManager {
    config: BackupConfig,
    dumps: Arc<dyn DatabaseDumps>,
}

impl BackupManager {
    pub fn new(config: BackupConfig, dumps: Arc<dyn DatabaseDumps>) -> Self {
        Self { config, dumps }
    }

    /// 使用真实的 compose 实现
    pub async fn from_config(config: BackupConfig) -> Self {
        let runner = CommandRunner::new(&config.stack.project_dir)
            .with_envs(&config.stack.exported_env);
        let compose = ComposeCli::detect(runner, config.stack.compose_file.clone()).await;
        Self::new(config, Arc::new(compose))
    }

    /// 执行备份并清理过期文件
    pub async fn run(&self) -> Result<BackupReport, BackupError> {
        let dir = &self.config.backup_dir;
        let database = &self.config.credentials.database;

        fs::create_dir_all(dir)
            .await
            .map_err(|source| BackupError::CreateDir {
                path: dir.clone(),
                source,
            })?;

        let _lock = BackupLock::acquire(dir)?;

        let artifact = BackupArtifact::new(dir, database, Local::now().naive_local());
        info!(
            database = %database,
            service = %self.config.db_service,
            artifact = %artifact.path.display(),
            "Starting database backup"
        );

        self.dump_atomically(&artifact).await?;

        let size_bytes = fs::metadata(&artifact.path)
            .await
            .map(|m| m.len())
            .map_err(|source| BackupError::Finalize {
                path: artifact.path.clone(),
                source,
            })?;
        info!(artifact = %artifact.path.display(), size_bytes, "Backup written");

        let removed = self.sweep(Some(artifact.path.clone())).await?;
        for path in &removed {
            info!(path = %path.display(), "Removed expired backup");
        }

        Ok(BackupReport {
            artifact: artifact.path,
            size_bytes,
            removed,
        })
    }

    /// 列出当前数据库的备份（目录不存在时为空）
    pub async fn list(&self) -> Result<Vec<ArtifactInfo>, BackupError> {
        let dir = self.config.backup_dir.clone();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let database = self.config.credentials.database.clone();
        tokio::task::spawn_blocking(move || {
            retention::scan(&dir, &database, SystemTime::now())
                .map_err(|source| BackupError::Scan { path: dir, source })
        })
        .await
        .map_err(|e| BackupError::Task(e.to_string()))?
    }

    /// 将备份文件导入数据库
    pub async fn restore(&self, input: &Path) -> Result<(), BackupError> {
        let is_file = fs::metadata(input)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(BackupError::MissingInput {
                path: input.to_path_buf(),
            });
        }

        let database = &self.config.credentials.database;
        let file_name = input.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if parse_artifact_file_name(database, file_name).is_none() {
            warn!(
                file = %input.display(),
                database = %database,
                "File name does not match this database's backup pattern"
            );
        }

        let dir = &self.config.backup_dir;
        fs::create_dir_all(dir)
            .await
            .map_err(|source| BackupError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        let _lock = BackupLock::acquire(dir)?;

        info!(file = %input.display(), database = %database, "Restoring database");
        self.dumps
            .restore(&self.config.db_service, &self.config.credentials, input)
            .await
            .map_err(|e| {
                error!(error = %e, "Restore failed");
                BackupError::Restore(e)
            })?;

        info!(file = %input.display(), "Restore complete");
        Ok(())
    }

    /// 先写临时文件，成功后原子重命名；失败时删除临时文件
    async fn dump_atomically(&self, artifact: &BackupArtifact) -> Result<(), BackupError> {
        let partial = artifact.partial_path();

        if let Err(e) = self
            .dumps
            .dump(&self.config.db_service, &self.config.credentials, &partial)
            .await
        {
            error!(error = %e, "Database dump failed");
            discard(&partial).await;
            return Err(BackupError::Dump(e));
        }

        let finalize = async {
            fs::File::open(&partial).await?.sync_all().await?;
            fs::rename(&partial, &artifact.path).await
        };
        if let Err(source) = finalize.await {
            discard(&partial).await;
            return Err(BackupError::Finalize {
                path: artifact.path.clone(),
                source,
            });
        }

        Ok(())
    }

    async fn sweep(&self, keep: Option<PathBuf>) -> Result<Vec<PathBuf>, BackupError> {
        let dir = self.config.backup_dir.clone();
        let database = self.config.credentials.database.clone();
        let max_age = self.config.retention();

        tokio::task::spawn_blocking(move || {
            retention::sweep(&dir, &database, max_age, keep.as_deref(), SystemTime::now())
                .map_err(BackupError::Sweep)
        })
        .await
        .map_err(|e| BackupError::Task(e.to_string()))?
    }
}

async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => info!(path = %path.display(), "Removed incomplete dump"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove incomplete dump"),
    }
}
