//! AutoContent Ops - 生产环境运维工具
//!
//! Usage:
//! - Rolling update: `autocontent-ops update`
//! - Database backup: `autocontent-ops backup`
//! - List backups: `autocontent-ops backups [--json]`
//! - Restore: `autocontent-ops restore backups/postgres_autocontent_20240101_030000.sql`
//!
//! 配置通过环境配置文件（`ENV_FILE`，默认 `.env.prod`）与环境变量提供。

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use autocontent_ops::config::env::constants::{DEFAULT_ENV_FILE, LEGACY_ENV_FILE, VERSION};
use autocontent_ops::config::{resolve_env_file, BackupConfig, EnvSource, UpdaterConfig};
use autocontent_ops::domain::ArtifactInfo;
use autocontent_ops::services::{BackupManager, DeploymentUpdater};
use autocontent_ops::{OpsError, OpsResult};

#[derive(Parser)]
#[command(name = "autocontent-ops")]
#[command(about = "AutoContent production operations: rolling update and database backup")]
#[command(version)]
struct Cli {
    /// Env file to load (default: .env.prod; backup commands fall back to .env)
    #[arg(long, global = true, env = "ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Compose manifest, overrides COMPOSE_FILE
    #[arg(long, global = true)]
    compose_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull, rebuild, migrate and health-check the production stack
    Update,
    /// Dump the database and prune expired backups
    Backup,
    /// List backups of the configured database
    Backups {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load a backup file into the database
    Restore {
        /// Backup file to restore
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "autocontent-ops failed");
            let code = e
                .downcast_ref::<OpsError>()
                .map(OpsError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    info!(version = VERSION, "autocontent-ops starting");

    let result = rt.block_on(async move {
        match cli.command {
            Commands::Update => update(cli.env_file, cli.compose_file).await,
            Commands::Backup => backup(cli.env_file, cli.compose_file).await,
            Commands::Backups { json } => list_backups(cli.env_file, cli.compose_file, json).await,
            Commands::Restore { file } => restore(cli.env_file, cli.compose_file, file).await,
        }
    });

    Ok(result?)
}

async fn update(env_file: Option<PathBuf>, compose_file: Option<PathBuf>) -> OpsResult<()> {
    let env_file = resolve_env_file(env_file, &[DEFAULT_ENV_FILE]);
    let source = EnvSource::load(&env_file).await?;
    let config = UpdaterConfig::from_source(&source, compose_file);

    let report = DeploymentUpdater::from_config(&config).await?.run().await?;
    info!(
        stages = report.stages.len(),
        elapsed_ms = report.elapsed().as_millis() as u64,
        "Production update finished"
    );
    Ok(())
}

async fn backup_manager(
    env_file: Option<PathBuf>,
    compose_file: Option<PathBuf>,
) -> OpsResult<BackupManager> {
    let env_file = resolve_env_file(env_file, &[DEFAULT_ENV_FILE, LEGACY_ENV_FILE]);
    let source = EnvSource::load(&env_file).await?;
    let config = BackupConfig::from_source(&source, compose_file)?;
    Ok(BackupManager::from_config(config).await)
}

async fn backup(env_file: Option<PathBuf>, compose_file: Option<PathBuf>) -> OpsResult<()> {
    let report = backup_manager(env_file, compose_file).await?.run().await?;
    info!(
        size_bytes = report.size_bytes,
        removed = report.removed.len(),
        "Backup finished"
    );
    println!("{}", backup_created_line(&report.artifact));
    Ok(())
}

async fn list_backups(
    env_file: Option<PathBuf>,
    compose_file: Option<PathBuf>,
    json: bool,
) -> OpsResult<()> {
    let artifacts = backup_manager(env_file, compose_file).await?.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
        return Ok(());
    }

    for artifact in &artifacts {
        println!("{}", format_row(artifact));
    }
    Ok(())
}

async fn restore(
    env_file: Option<PathBuf>,
    compose_file: Option<PathBuf>,
    file: PathBuf,
) -> OpsResult<()> {
    backup_manager(env_file, compose_file)
        .await?
        .restore(&file)
        .await?;
    Ok(())
}

fn backup_created_line(artifact: &Path) -> String {
    format!("Backup created: {}", artifact.display())
}

fn format_row(artifact: &ArtifactInfo) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        artifact.file_name,
        format_size(artifact.size_bytes),
        artifact.modified_at.format("%Y-%m-%d %H:%M:%S UTC"),
        format_age(artifact.age_secs)
    )
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

fn format_age(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    match (days, hours) {
        (0, 0) => format!("{}m", minutes),
        (0, _) => format!("{}h {}m", hours, minutes),
        _ => format!("{}d {}h", days, hours),
    }
}
