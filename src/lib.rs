//! AutoContent Ops - 生产环境运维工具
//!
//! 滚动更新（拉取、重建、迁移、健康检查）与数据库备份（导出、保留、清理）

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

pub use error::{OpsError, OpsResult};
