//! 基础设施模块
//!
//! 封装外部依赖（编排 CLI、git、HTTP 健康检查、命令执行）。
//! 工作流只通过下面的能力接口访问它们，测试中替换为内存实现。

pub mod command;
pub mod compose;
pub mod git;
pub mod health;

#[cfg(test)]
pub(crate) mod fake;

use std::path::Path;

use async_trait::async_trait;

use crate::domain::backup::DatabaseCredentials;

pub use command::{CommandError, CommandRunner};
pub use compose::ComposeCli;
pub use git::GitCli;
pub use health::{HttpHealthProbe, ProbeError};

/// 拉取最新源码
#[async_trait]
pub trait SourceControl: Send + Sync {
    async fn pull_latest(&self) -> Result<(), CommandError>;
}

/// 重建并重启编排栈中的服务
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// 重建镜像、重启服务并移除编排文件中已不存在的容器
    async fn rebuild_services(&self) -> Result<(), CommandError>;
}

/// 数据库迁移
#[async_trait]
pub trait Migrator: Send + Sync {
    /// 在 `service` 的一次性容器中迁移到最新版本
    async fn upgrade_head(&self, service: &str) -> Result<(), CommandError>;
}

/// 数据库导出与导入
#[async_trait]
pub trait DatabaseDumps: Send + Sync {
    /// 在 `service` 中执行逻辑导出，写入宿主机上的 `output`
    async fn dump(
        &self,
        service: &str,
        credentials: &DatabaseCredentials,
        output: &Path,
    ) -> Result<(), CommandError>;

    /// 将 `input` 导入 `service` 中的数据库
    async fn restore(
        &self,
        service: &str,
        credentials: &DatabaseCredentials,
        input: &Path,
    ) -> Result<(), CommandError>;
}

/// 存活探测
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self, url: &str) -> Result<(), ProbeError>;
}
