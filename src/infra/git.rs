//! Git 源码更新

use async_trait::async_trait;

use super::command::{CommandError, CommandRunner};
use super::SourceControl;

/// git CLI
#[derive(Clone, Debug)]
pub struct GitCli {
    runner: CommandRunner,
    remote: String,
    branch: Option<String>,
}

impl GitCli {
    pub fn new(runner: CommandRunner, remote: &str, branch: Option<String>) -> Self {
        Self {
            runner,
            remote: remote.to_string(),
            branch,
        }
    }

    /// `git pull --ff-only [<remote> <branch>]`
    fn pull_args(&self) -> Vec<&str> {
        let mut args = vec!["pull", "--ff-only"];
        if let Some(ref branch) = self.branch {
            args.push(&self.remote);
            args.push(branch);
        }
        args
    }
}

#[async_trait]
impl SourceControl for GitCli {
    async fn pull_latest(&self) -> Result<(), CommandError> {
        self.runner.run("git", &self.pull_args()).await
    }
}
