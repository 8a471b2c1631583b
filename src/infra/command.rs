//! 命令执行器
//!
//! 提供统一的外部命令执行接口，支持：
//! - stdout/stderr 按行转发到日志
//! - stdout 重定向到文件、stdin 来自文件
//! - 显式传递环境变量（不修改当前进程环境）

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// 命令执行错误
#[derive(Debug, Error)]
pub enum CommandError {
    /// 命令启动失败（如程序不存在）
    #[error("failed to spawn `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// 等待命令完成失败
    #[error("failed to wait for `{program}`: {source}")]
    WaitFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// 重定向文件无法打开
    #[error("failed to open {} for `{program}`: {source}", path.display())]
    Redirect {
        program: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 命令以非零状态退出
    #[error("`{program}` exited with {}", describe_exit(.code))]
    Failed { program: String, code: Option<i32> },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl CommandError {
    /// 进程退出码：透传失败命令的退出码，其余情况为 1
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Failed {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}

/// 命令执行器
#[derive(Clone, Debug)]
pub struct CommandRunner {
    work_dir: PathBuf,
    envs: BTreeMap<String, String>,
}

impl CommandRunner {
    /// 创建在 `work_dir` 中执行命令的执行器
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            envs: BTreeMap::new(),
        }
    }

    /// 附加传递给子进程的环境变量
    pub fn with_envs(mut self, envs: &BTreeMap<String, String>) -> Self {
        self.envs
            .extend(envs.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// 附加单个环境变量
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.envs.insert(key.to_string(), value.to_string());
        self
    }

    /// 执行命令，输出转发到日志
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<(), CommandError> {
        let mut cmd = self.command(program, args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        self.spawn_and_wait(program, args, cmd).await
    }

    /// 执行命令，stdout 写入 `output`
    pub async fn run_to_file(
        &self,
        program: &str,
        args: &[&str],
        output: &Path,
    ) -> Result<(), CommandError> {
        let file = tokio::fs::File::create(output)
            .await
            .map_err(|source| CommandError::Redirect {
                program: program.to_string(),
                path: output.to_path_buf(),
                source,
            })?
            .into_std()
            .await;

        let mut cmd = self.command(program, args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(file))
            .stderr(Stdio::piped());
        self.spawn_and_wait(program, args, cmd).await
    }

    /// 执行命令，stdin 来自 `input`
    pub async fn run_from_file(
        &self,
        program: &str,
        args: &[&str],
        input: &Path,
    ) -> Result<(), CommandError> {
        let file = tokio::fs::File::open(input)
            .await
            .map_err(|source| CommandError::Redirect {
                program: program.to_string(),
                path: input.to_path_buf(),
                source,
            })?
            .into_std()
            .await;

        let mut cmd = self.command(program, args);
        cmd.stdin(Stdio::from(file))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        self.spawn_and_wait(program, args, cmd).await
    }

    /// 静默执行，只关心是否成功
    ///
    /// 用于探测（如 `which docker-compose`）
    pub async fn succeeds(&self, program: &str, args: &[&str]) -> bool {
        self.command(program, args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn command(&self, program: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.work_dir)
            .envs(&self.envs)
            .kill_on_drop(true);
        cmd
    }

    async fn spawn_and_wait(
        &self,
        program: &str,
        args: &[&str],
        mut cmd: Command,
    ) -> Result<(), CommandError> {
        info!(command = %format!("{} {}", program, args.join(" ")), "Running command");

        let mut child = cmd.spawn().map_err(|source| CommandError::SpawnFailed {
            program: program.to_string(),
            source,
        })?;

        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward_lines(program.to_string(), "stdout", out)));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward_lines(program.to_string(), "stderr", err)));

        let status = wait(program, &mut child).await;

        // 等待日志读取完成
        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        let status = status?;
        if status.success() {
            debug!(program = %program, "Command finished");
            Ok(())
        } else {
            Err(CommandError::Failed {
                program: program.to_string(),
                code: status.code(),
            })
        }
    }
}

async fn wait(program: &str, child: &mut Child) -> Result<std::process::ExitStatus, CommandError> {
    child.wait().await.map_err(|source| CommandError::WaitFailed {
        program: program.to_string(),
        source,
    })
}

async fn forward_lines<R>(program: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!(target: "autocontent_ops::child", program = %program, stream, "{}", line);
    }
}
