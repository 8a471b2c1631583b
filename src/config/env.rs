//! 配置来源
//!
//! 查找顺序：环境配置文件 → 进程环境变量 → 默认值。
//! 进程环境只在启动时读取一次，之后不再修改。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use super::env_file::EnvFile;
use super::ConfigError;

/// 不可变的配置来源快照
#[derive(Clone, Debug, Default)]
pub struct EnvSource {
    /// 实际加载的配置文件路径（文件不存在时为 None）
    pub env_file: Option<PathBuf>,
    file: BTreeMap<String, String>,
    process: BTreeMap<String, String>,
}

impl EnvSource {
    /// 由已解析的变量构造
    pub fn new(file: BTreeMap<String, String>, process: BTreeMap<String, String>) -> Self {
        Self {
            env_file: None,
            file,
            process,
        }
    }

    /// 加载配置文件并快照当前进程环境
    pub async fn load(env_file: &Path) -> Result<Self, ConfigError> {
        let process: BTreeMap<String, String> = std::env::vars().collect();

        match EnvFile::load_optional(env_file).await? {
            Some(file) => {
                info!(
                    path = %file.path.display(),
                    vars = file.vars.len(),
                    "Loaded environment configuration"
                );
                Ok(Self {
                    env_file: Some(file.path),
                    file: file.vars,
                    process,
                })
            }
            None => {
                info!(path = %env_file.display(), "Env file not present, using defaults");
                Ok(Self::new(BTreeMap::new(), process))
            }
        }
    }

    /// 查找变量，空字符串视为未设置
    pub fn get(&self, key: &str) -> Option<&str> {
        self.file
            .get(key)
            .or_else(|| self.process.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// 查找字符串变量，缺失时使用默认值
    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// 解析变量，缺失或无法解析时使用默认值
    pub fn parse_or<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr,
    {
        match self.get(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(key = %key, value = %raw, "Invalid value, falling back to default");
                default
            }),
            None => default,
        }
    }

    /// 需要传递给子进程的变量（即配置文件中声明的变量）
    pub fn exported(&self) -> &BTreeMap<String, String> {
        &self.file
    }
}

/// 选择环境配置文件
///
/// 显式指定时直接使用；否则取第一个存在的候选，全部不存在时取第一个候选。
pub fn resolve_env_file(explicit: Option<PathBuf>, candidates: &[&str]) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| candidates.first().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_ENV_FILE))
}

/// 常量
pub mod constants {
    /// 生产环境配置文件
    pub const DEFAULT_ENV_FILE: &str = ".env.prod";

    /// 旧版备份脚本使用的配置文件
    pub const LEGACY_ENV_FILE: &str = ".env";

    /// 生产编排文件
    pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.prod.yml";

    /// 子进程工作目录
    pub const DEFAULT_PROJECT_DIR: &str = ".";

    pub const DEFAULT_API_HOST: &str = "localhost";
    pub const DEFAULT_API_PORT: u16 = 8000;
    pub const DEFAULT_API_SERVICE: &str = "api";

    /// 健康检查路径
    pub const HEALTH_PATH: &str = "/healthz";

    /// 健康检查超时（秒）
    pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 10;

    pub const DEFAULT_DEPLOY_REMOTE: &str = "origin";

    pub const DEFAULT_POSTGRES_USER: &str = "postgres";
    pub const DEFAULT_POSTGRES_PASSWORD: &str = "postgres";
    pub const DEFAULT_POSTGRES_DB: &str = "autocontent";
    pub const DEFAULT_DB_SERVICE: &str = "postgres";

    pub const DEFAULT_BACKUP_DIR: &str = "./backups";

    /// 备份保留天数
    pub const DEFAULT_RETENTION_DAYS: u64 = 7;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
