//! 配置模块
//!
//! 环境配置文件解析与工作流配置

pub mod env;
pub mod env_file;
pub mod settings;

use std::path::PathBuf;

use thiserror::Error;

pub use env::{resolve_env_file, EnvSource};
pub use env_file::EnvFile;
pub use settings::{BackupConfig, StackConfig, UpdaterConfig};

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read env file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
