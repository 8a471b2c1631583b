//! Docker Compose 编排
//!
//! 通过 `docker-compose` 或 `docker compose` 执行重建、迁移、导出与导入

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::command::{CommandError, CommandRunner};
use super::{DatabaseDumps, Migrator, Orchestrator};
use crate::domain::backup::DatabaseCredentials;

/// Compose CLI
#[derive(Clone, Debug)]
pub struct ComposeCli {
    runner: CommandRunner,
    program: String,
    base_args: Vec<String>,
    compose_file: PathBuf,
}

impl ComposeCli {
    /// 探测可用的 compose 命令（优先 docker-compose，回退到 docker compose）
    pub async fn detect(runner: CommandRunner, compose_file: PathBuf) -> Self {
        let (program, base_args) = if runner.succeeds("which", &["docker-compose"]).await {
            ("docker-compose", vec![])
        } else {
            ("docker", vec!["compose".to_string()])
        };

        info!(program = %program, compose_file = %compose_file.display(), "Using compose command");
        Self::with_program(runner, program, base_args, compose_file)
    }

    /// 使用指定的 compose 命令
    pub fn with_program(
        runner: CommandRunner,
        program: &str,
        base_args: Vec<String>,
        compose_file: PathBuf,
    ) -> Self {
        Self {
            runner,
            program: program.to_string(),
            base_args,
            compose_file,
        }
    }

    /// 完整参数：`[base...] -f <file> <tail...>`
    fn args(&self, tail: &[&str]) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("-f".to_string());
        args.push(self.compose_file.to_string_lossy().into_owned());
        args.extend(tail.iter().map(|s| s.to_string()));
        args
    }

    async fn run(&self, tail: &[&str]) -> Result<(), CommandError> {
        let args = self.args(tail);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run(&self.program, &args).await
    }

    /// 密码只经环境变量传入，避免出现在命令行与日志中
    fn db_runner(&self, credentials: &DatabaseCredentials) -> CommandRunner {
        self.runner
            .clone()
            .with_env("PGPASSWORD", &credentials.password)
    }
}

#[async_trait]
impl Orchestrator for ComposeCli {
    async fn rebuild_services(&self) -> Result<(), CommandError> {
        self.run(&["up", "-d", "--build", "--remove-orphans"]).await
    }
}

#[async_trait]
impl Migrator for ComposeCli {
    async fn upgrade_head(&self, service: &str) -> Result<(), CommandError> {
        self.run(&["run", "--rm", service, "alembic", "upgrade", "head"])
            .await
    }
}

#[async_trait]
impl DatabaseDumps for ComposeCli {
    async fn dump(
        &self,
        service: &str,
        credentials: &DatabaseCredentials,
        output: &Path,
    ) -> Result<(), CommandError> {
        let args = self.args(&[
            "exec",
            "-T",
            "-e",
            "PGPASSWORD",
            service,
            "pg_dump",
            "-U",
            &credentials.user,
            &credentials.database,
        ]);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        self.db_runner(credentials)
            .run_to_file(&self.program, &args, output)
            .await
    }

    async fn restore(
        &self,
        service: &str,
        credentials: &DatabaseCredentials,
        input: &Path,
    ) -> Result<(), CommandError> {
        let args = self.args(&[
            "exec",
            "-T",
            "-e",
            "PGPASSWORD",
            service,
            "psql",
            "-v",
            "ON_ERROR_STOP=1",
            "-U",
            &credentials.user,
            "-d",
            &credentials.database,
        ]);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        self.db_runner(credentials)
            .run_from_file(&self.program, &args, input)
            .await
    }
}
