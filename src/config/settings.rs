//! 工作流配置

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::env::{constants, EnvSource};
use super::ConfigError;
use crate::domain::backup::DatabaseCredentials;

/// 编排栈配置（两个工作流共用）
#[derive(Clone, Debug)]
pub struct StackConfig {
    /// 编排文件路径
    pub compose_file: PathBuf,
    /// 子进程工作目录
    pub project_dir: PathBuf,
    /// 传递给子进程的环境变量
    pub exported_env: BTreeMap<String, String>,
}

impl StackConfig {
    /// `compose_override` 来自命令行，优先级最高
    pub fn from_source(source: &EnvSource, compose_override: Option<PathBuf>) -> Self {
        let compose_file = compose_override.unwrap_or_else(|| {
            PathBuf::from(source.string_or("COMPOSE_FILE", constants::DEFAULT_COMPOSE_FILE))
        });
        let project_dir =
            PathBuf::from(source.string_or("PROJECT_DIR", constants::DEFAULT_PROJECT_DIR));

        Self {
            compose_file,
            project_dir,
            exported_env: source.exported().clone(),
        }
    }
}

/// 滚动更新配置
#[derive(Clone, Debug)]
pub struct UpdaterConfig {
    pub stack: StackConfig,
    /// 执行迁移的服务
    pub api_service: String,
    /// 健康检查主机
    pub api_host: String,
    /// 健康检查端口
    pub api_port: u16,
    /// 健康检查超时
    pub health_timeout: Duration,
    /// 拉取的远端
    pub deploy_remote: String,
    /// 拉取的分支（未设置时使用当前分支的上游）
    pub deploy_branch: Option<String>,
}

impl UpdaterConfig {
    pub fn from_source(source: &EnvSource, compose_override: Option<PathBuf>) -> Self {
        Self {
            stack: StackConfig::from_source(source, compose_override),
            api_service: source.string_or("API_SERVICE", constants::DEFAULT_API_SERVICE),
            api_host: source.string_or("API_HOST", constants::DEFAULT_API_HOST),
            api_port: source.parse_or("API_PORT", constants::DEFAULT_API_PORT),
            health_timeout: Duration::from_secs(
                source.parse_or("HEALTH_TIMEOUT_SECS", constants::DEFAULT_HEALTH_TIMEOUT_SECS),
            ),
            deploy_remote: source.string_or("DEPLOY_REMOTE", constants::DEFAULT_DEPLOY_REMOTE),
            deploy_branch: source.get("DEPLOY_BRANCH").map(str::to_string),
        }
    }

    /// 健康检查 URL
    pub fn health_url(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.api_host,
            self.api_port,
            constants::HEALTH_PATH
        )
    }
}

/// 备份配置
#[derive(Clone, Debug)]
pub struct BackupConfig {
    pub stack: StackConfig,
    pub credentials: DatabaseCredentials,
    /// 运行 pg_dump / psql 的服务
    pub db_service: String,
    /// 备份目录
    pub backup_dir: PathBuf,
    /// 保留天数
    pub retention_days: u64,
}

impl BackupConfig {
    pub fn from_source(
        source: &EnvSource,
        compose_override: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let credentials = DatabaseCredentials {
            user: source.string_or("POSTGRES_USER", constants::DEFAULT_POSTGRES_USER),
            password: source.string_or("POSTGRES_PASSWORD", constants::DEFAULT_POSTGRES_PASSWORD),
            database: source.string_or("POSTGRES_DB", constants::DEFAULT_POSTGRES_DB),
        };

        // 数据库名直接进入文件名
        if credentials.database.contains(['/', '\\']) || credentials.database.starts_with('.') {
            return Err(ConfigError::Invalid {
                key: "POSTGRES_DB",
                reason: format!(
                    "'{}' cannot be used in a backup file name",
                    credentials.database
                ),
            });
        }

        Ok(Self {
            stack: StackConfig::from_source(source, compose_override),
            credentials,
            db_service: source.string_or("DB_SERVICE", constants::DEFAULT_DB_SERVICE),
            backup_dir: PathBuf::from(
                source.string_or("BACKUP_DIR", constants::DEFAULT_BACKUP_DIR),
            ),
            retention_days: source.parse_or("RETENTION_DAYS", constants::DEFAULT_RETENTION_DAYS),
        })
    }

    /// 保留窗口：N × 24 小时
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(24 * 60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(pairs: &[(&str, &str)]) -> EnvSource {
        EnvSource::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_updater_defaults() {
        let config = UpdaterConfig::from_source(&EnvSource::default(), None);
        assert_eq!(config.stack.compose_file, PathBuf::from("docker-compose.prod.yml"));
        assert_eq!(config.api_port, 8000);
        assert_eq!(config.api_service, "api");
        assert_eq!(config.health_url(), "http://localhost:8000/healthz");
        assert!(config.deploy_branch.is_none());
    }

    #[test]
    fn test_updater_from_file_values() {
        let config = UpdaterConfig::from_source(
            &source(&[
                ("API_PORT", "9100"),
                ("COMPOSE_FILE", "stack.yml"),
                ("DEPLOY_BRANCH", "main"),
            ]),
            None,
        );
        assert_eq!(config.api_port, 9100);
        assert_eq!(config.stack.compose_file, PathBuf::from("stack.yml"));
        assert_eq!(config.deploy_branch.as_deref(), Some("main"));
        assert_eq!(config.stack.exported_env.len(), 3);
    }

    #[test]
    fn test_compose_override_wins() {
        let config = UpdaterConfig::from_source(
            &source(&[("COMPOSE_FILE", "stack.yml")]),
            Some(PathBuf::from("cli.yml")),
        );
        assert_eq!(config.stack.compose_file, PathBuf::from("cli.yml"));
    }

    #[test]
    fn test_backup_defaults() {
        let config = BackupConfig::from_source(&EnvSource::default(), None).unwrap();
        assert_eq!(config.credentials.user, "postgres");
        assert_eq!(config.credentials.password, "postgres");
        assert_eq!(config.credentials.database, "autocontent");
        assert_eq!(config.backup_dir, PathBuf::from("./backups"));
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.retention(), Duration::from_secs(7 * 86_400));
        assert_eq!(config.db_service, "postgres");
    }

    #[test]
    fn test_backup_rejects_path_like_database() {
        let err = BackupConfig::from_source(&source(&[("POSTGRES_DB", "../etc")]), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "POSTGRES_DB", .. }));
    }

    #[test]
    fn test_backup_zero_retention() {
        let config =
            BackupConfig::from_source(&source(&[("RETENTION_DAYS", "0")]), None).unwrap();
        assert_eq!(config.retention(), Duration::ZERO);
    }
}
