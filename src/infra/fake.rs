//! 测试用内存实现
//!
//! 所有调用按顺序记录到共享的 `CallLog`，便于断言执行顺序

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    CommandError, DatabaseDumps, HealthProbe, Migrator, Orchestrator, ProbeError, SourceControl,
};
use crate::domain::backup::DatabaseCredentials;

/// 调用记录
#[derive(Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(crate) fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

fn failed(program: &str, code: i32) -> CommandError {
    CommandError::Failed {
        program: program.to_string(),
        code: Some(code),
    }
}

/// 可配置失败的外部工具集合
#[derive(Clone, Default)]
pub(crate) struct FakeStack {
    pub(crate) log: CallLog,
    /// 失败步骤及其退出码
    pub(crate) fail_pull: Option<i32>,
    pub(crate) fail_rebuild: Option<i32>,
    pub(crate) fail_migrate: Option<i32>,
    pub(crate) fail_dump: Option<i32>,
    pub(crate) fail_restore: Option<i32>,
    /// 健康检查返回的 HTTP 状态，None 表示 200
    pub(crate) health_status: Option<u16>,
    /// 导出内容
    pub(crate) dump_body: String,
}

impl FakeStack {
    pub(crate) fn new() -> Self {
        Self {
            dump_body: "-- PostgreSQL database dump\n".to_string(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SourceControl for FakeStack {
    async fn pull_latest(&self) -> Result<(), CommandError> {
        self.log.push("pull");
        match self.fail_pull {
            Some(code) => Err(failed("git", code)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Orchestrator for FakeStack {
    async fn rebuild_services(&self) -> Result<(), CommandError> {
        self.log.push("rebuild");
        match self.fail_rebuild {
            Some(code) => Err(failed("docker", code)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Migrator for FakeStack {
    async fn upgrade_head(&self, service: &str) -> Result<(), CommandError> {
        self.log.push(format!("migrate:{}", service));
        match self.fail_migrate {
            Some(code) => Err(failed("docker", code)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DatabaseDumps for FakeStack {
    async fn dump(
        &self,
        service: &str,
        credentials: &DatabaseCredentials,
        output: &Path,
    ) -> Result<(), CommandError> {
        self.log
            .push(format!("dump:{}:{}", service, credentials.database));

        match self.fail_dump {
            Some(code) => {
                // 模拟工具在失败前已写出部分内容
                let _ = std::fs::write(output, "-- truncated");
                Err(failed("docker", code))
            }
            None => std::fs::write(output, &self.dump_body).map_err(|source| {
                CommandError::Redirect {
                    program: "docker".to_string(),
                    path: output.to_path_buf(),
                    source,
                }
            }),
        }
    }

    async fn restore(
        &self,
        service: &str,
        credentials: &DatabaseCredentials,
        input: &Path,
    ) -> Result<(), CommandError> {
        self.log.push(format!(
            "restore:{}:{}:{}",
            service,
            credentials.database,
            input.file_name().and_then(|n| n.to_str()).unwrap_or_default()
        ));
        match self.fail_restore {
            Some(code) => Err(failed("docker", code)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HealthProbe for FakeStack {
    async fn check(&self, url: &str) -> Result<(), ProbeError> {
        self.log.push(format!("probe:{}", url));
        match self.health_status {
            Some(status) if !(200..300).contains(&status) => Err(ProbeError::Status {
                url: url.to_string(),
                status,
            }),
            _ => Ok(()),
        }
    }
}
