//! 领域模型
//!
//! 工作流阶段与备份文件

pub mod backup;
pub mod stage;

pub use backup::{ArtifactInfo, BackupArtifact, DatabaseCredentials};
pub use stage::{Stage, StageStatus};
