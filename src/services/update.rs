//! 生产环境滚动更新
//!
//! git pull → compose 重建 → 数据库迁移 → 健康检查。
//! 任一步骤失败立即中止，后续步骤不会执行。

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use crate::config::UpdaterConfig;
use crate::domain::stage::{skip_pending, total_duration, Stage};
use crate::infra::{
    CommandError, CommandRunner, ComposeCli, GitCli, HealthProbe, HttpHealthProbe, Migrator,
    Orchestrator, ProbeError, SourceControl,
};

/// 更新错误
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("git pull failed: {0}")]
    Pull(#[source] CommandError),

    #[error("service rebuild failed: {0}")]
    Rebuild(#[source] CommandError),

    #[error("migration failed: {0}")]
    Migrate(#[source] CommandError),

    #[error("{0}")]
    Health(#[source] ProbeError),
}

impl UpdateError {
    pub fn exit_code(&self) -> i32 {
        match self {
            UpdateError::Pull(e) | UpdateError::Rebuild(e) | UpdateError::Migrate(e) => {
                e.exit_code()
            }
            UpdateError::Health(_) => 1,
        }
    }
}

/// 更新结果
#[derive(Clone, Debug)]
pub struct UpdateReport {
    pub stages: Vec<Stage>,
}

impl UpdateReport {
    /// 各阶段耗时之和
    pub fn elapsed(&self) -> Duration {
        total_duration(&self.stages)
    }
}

/// 滚动更新器
pub struct DeploymentUpdater {
    source: Arc<dyn SourceControl>,
    orchestrator: Arc<dyn Orchestrator>,
    migrator: Arc<dyn Migrator>,
    probe: Arc<dyn HealthProbe>,
    api_service: String,
    health_url: String,
}

impl DeploymentUpdater {
    pub fn new(
        config: &UpdaterConfig,
        source: Arc<dyn SourceControl>,
        orchestrator: Arc<dyn Orchestrator>,
        migrator: Arc<dyn Migrator>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        Self {
            source,
            orchestrator,
            migrator,
            probe,
            api_service: config.api_service.clone(),
            health_url: config.health_url(),
        }
    }

    /// 使用真实的 git / compose / HTTP 实现
    pub async fn from_config(config: &UpdaterConfig) -> Result<Self, UpdateError> {
        let runner = CommandRunner::new(&config.stack.project_dir)
            .with_envs(&config.stack.exported_env);
        let git = GitCli::new(
            runner.clone(),
            &config.deploy_remote,
            config.deploy_branch.clone(),
        );
        let compose = Arc::new(ComposeCli::detect(runner, config.stack.compose_file.clone()).await);
        let probe = HttpHealthProbe::new(config.health_timeout).map_err(UpdateError::Health)?;

        Ok(Self::new(
            config,
            Arc::new(git),
            compose.clone(),
            compose,
            Arc::new(probe),
        ))
    }

    /// 执行更新
    pub async fn run(&self) -> Result<UpdateReport, UpdateError> {
        let mut stages = vec![
            Stage::new("git_pull", "Git Pull"),
            Stage::new("compose_up", "Compose Up"),
            Stage::new("migrate", "Migrate"),
            Stage::new("health_check", "Health Check"),
        ];

        info!(health_url = %self.health_url, "=== Production Update ===");

        let outcome = self.run_stages(&mut stages).await;
        if outcome.is_err() {
            skip_pending(&mut stages, "previous stage failed");
        }

        info!("=== Stage Summary ===");
        for stage in &stages {
            info!("{}", stage.summary_line());
        }

        match outcome {
            Ok(()) => {
                info!("=== Update Complete ===");
                Ok(UpdateReport { stages })
            }
            Err(e) => {
                error!(error = %e, exit_code = e.exit_code(), "Update aborted");
                Err(e)
            }
        }
    }

    async fn run_stages(&self, stages: &mut [Stage]) -> Result<(), UpdateError> {
        let total = stages.len();

        begin(&mut stages[0], 1, total);
        let pulled = self.source.pull_latest().await;
        end(&mut stages[0], &pulled);
        pulled.map_err(UpdateError::Pull)?;

        begin(&mut stages[1], 2, total);
        let rebuilt = self.orchestrator.rebuild_services().await;
        end(&mut stages[1], &rebuilt);
        rebuilt.map_err(UpdateError::Rebuild)?;

        begin(&mut stages[2], 3, total);
        let migrated = self.migrator.upgrade_head(&self.api_service).await;
        end(&mut stages[2], &migrated);
        migrated.map_err(UpdateError::Migrate)?;

        begin(&mut stages[3], 4, total);
        let healthy = self.probe.check(&self.health_url).await;
        end(&mut stages[3], &healthy);
        healthy.map_err(UpdateError::Health)?;

        Ok(())
    }
}

fn begin(stage: &mut Stage, index: usize, total: usize) {
    info!(stage = %stage.name, "[{}/{}] {}...", index, total, stage.display_name);
    stage.start();
}

fn end<E: std::fmt::Display>(stage: &mut Stage, result: &Result<(), E>) {
    match result {
        Ok(()) => stage.succeed(),
        Err(e) => stage.fail(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvSource;
    use crate::domain::stage::StageStatus;
    use crate::infra::fake::FakeStack;

    fn updater(stack: &FakeStack) -> DeploymentUpdater {
        let config = UpdaterConfig::from_source(&EnvSource::default(), None);
        let fake = Arc::new(stack.clone());
        DeploymentUpdater::new(&config, fake.clone(), fake.clone(), fake.clone(), fake)
    }

    fn statuses(report: &[Stage]) -> Vec<StageStatus> {
        report.iter().map(|s| s.status).collect()
    }

    #[tokio::test]
    async fn test_full_sequence_in_order() {
        let stack = FakeStack::new();
        let report = updater(&stack).run().await.unwrap();

        assert_eq!(
            stack.log.calls(),
            vec![
                "pull",
                "rebuild",
                "migrate:api",
                "probe:http://localhost:8000/healthz",
            ]
        );
        assert!(report
            .stages
            .iter()
            .all(|s| s.status == StageStatus::Success));
        assert_eq!(report.elapsed(), total_duration(&report.stages));
    }

    #[tokio::test]
    async fn test_migration_failure_skips_probe() {
        let stack = FakeStack {
            fail_migrate: Some(2),
            ..FakeStack::new()
        };

        let err = updater(&stack).run().await.unwrap_err();

        assert!(matches!(err, UpdateError::Migrate(_)));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(stack.log.calls(), vec!["pull", "rebuild", "migrate:api"]);
    }

    #[tokio::test]
    async fn test_pull_failure_stops_everything() {
        let stack = FakeStack {
            fail_pull: Some(128),
            ..FakeStack::new()
        };

        let err = updater(&stack).run().await.unwrap_err();

        assert!(matches!(err, UpdateError::Pull(_)));
        assert_eq!(err.exit_code(), 128);
        assert_eq!(stack.log.calls(), vec!["pull"]);
    }

    #[tokio::test]
    async fn test_rebuild_failure_skips_migration() {
        let stack = FakeStack {
            fail_rebuild: Some(1),
            ..FakeStack::new()
        };

        assert!(matches!(
            updater(&stack).run().await,
            Err(UpdateError::Rebuild(_))
        ));
        assert_eq!(stack.log.calls(), vec!["pull", "rebuild"]);
    }

    #[tokio::test]
    async fn test_probe_failure_after_successful_migration() {
        let stack = FakeStack {
            health_status: Some(502),
            ..FakeStack::new()
        };

        let err = updater(&stack).run().await.unwrap_err();

        assert!(matches!(
            err,
            UpdateError::Health(ProbeError::Status { status: 502, .. })
        ));
        assert_ne!(err.exit_code(), 0);
        assert_eq!(stack.log.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_stage_statuses_after_failure() {
        let stack = FakeStack {
            fail_rebuild: Some(1),
            ..FakeStack::new()
        };
        let fake = Arc::new(stack.clone());
        let config = UpdaterConfig::from_source(&EnvSource::default(), None);
        let updater =
            DeploymentUpdater::new(&config, fake.clone(), fake.clone(), fake.clone(), fake);

        let mut stages = vec![
            Stage::new("a", "A"),
            Stage::new("b", "B"),
            Stage::new("c", "C"),
            Stage::new("d", "D"),
        ];
        assert!(updater.run_stages(&mut stages).await.is_err());
        skip_pending(&mut stages, "previous stage failed");

        assert_eq!(
            statuses(&stages),
            vec![
                StageStatus::Success,
                StageStatus::Failed,
                StageStatus::Skipped,
                StageStatus::Skipped,
            ]
        );
        assert_eq!(
            stages[1].message.as_deref(),
            Some("`docker` exited with status 1")
        );
        assert_eq!(stages[3].summary_line(), "⊘ D (-): previous stage failed");
    }
}
