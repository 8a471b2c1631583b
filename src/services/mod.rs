//! 服务层模块
//!
//! 滚动更新与数据库备份两个工作流

pub mod backup;
pub mod update;

pub use backup::{BackupError, BackupManager, BackupReport};
pub use update::{DeploymentUpdater, UpdateError, UpdateReport};
