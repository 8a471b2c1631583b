//! 统一错误处理
//!
//! `OpsError` 汇总各层错误，并决定进程退出码：
//! 外部命令失败时透传其退出码，其余错误为 1。

use thiserror::Error;

use crate::config::ConfigError;
use crate::services::{BackupError, UpdateError};

/// 顶层错误
#[derive(Debug, Error)]
pub enum OpsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

impl OpsError {
    /// 进程退出码（1..=255）
    pub fn exit_code(&self) -> u8 {
        let code = match self {
            OpsError::Update(e) => e.exit_code(),
            OpsError::Backup(e) => e.exit_code(),
            OpsError::Config(_) | OpsError::Output(_) => 1,
        };
        u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
    }
}

/// 便捷类型别名
pub type OpsResult<T> = Result<T, OpsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::CommandError;

    fn failed(code: Option<i32>) -> CommandError {
        CommandError::Failed {
            program: "docker".to_string(),
            code,
        }
    }

    #[test]
    fn test_exit_code_propagates_command_status() {
        let err = OpsError::from(UpdateError::Migrate(failed(Some(2))));
        assert_eq!(err.exit_code(), 2);

        let err = OpsError::from(BackupError::Dump(failed(Some(127))));
        assert_eq!(err.exit_code(), 127);
    }

    #[test]
    fn test_exit_code_defaults_to_one() {
        let err = OpsError::from(UpdateError::Rebuild(failed(None)));
        assert_eq!(err.exit_code(), 1);

        let err = OpsError::from(ConfigError::Invalid {
            key: "POSTGRES_DB",
            reason: "bad".to_string(),
        });
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_out_of_range() {
        let err = OpsError::from(BackupError::Restore(failed(Some(-1))));
        assert_eq!(err.exit_code(), 1);

        let err = OpsError::from(BackupError::Restore(failed(Some(300))));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_display_is_transparent() {
        let err = OpsError::from(UpdateError::Migrate(failed(Some(2))));
        assert_eq!(err.to_string(), "migration failed: `docker` exited with status 2");
    }
}
