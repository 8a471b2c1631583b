//! 工作流阶段模型

use std::time::{Duration, Instant};

/// 阶段状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl StageStatus {
    /// 摘要中使用的图标
    pub fn icon(&self) -> &'static str {
        match self {
            StageStatus::Success => "✓",
            StageStatus::Failed => "✗",
            StageStatus::Skipped => "⊘",
            StageStatus::Running => "⟳",
            StageStatus::Pending => "○",
        }
    }
}

/// 阶段信息
#[derive(Clone, Debug)]
pub struct Stage {
    /// 阶段标识 (e.g., "git_pull", "migrate")
    pub name: String,
    /// 显示名称 (e.g., "Git Pull", "Migrate")
    pub display_name: String,
    pub status: StageStatus,
    pub duration: Option<Duration>,
    /// 失败原因或跳过原因
    pub message: Option<String>,
    started: Option<Instant>,
}

impl Stage {
    /// 创建新的待执行阶段
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            status: StageStatus::Pending,
            duration: None,
            message: None,
            started: None,
        }
    }

    /// 开始执行阶段
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.status = StageStatus::Running;
    }

    /// 成功完成
    pub fn succeed(&mut self) {
        self.complete(StageStatus::Success, None);
    }

    /// 失败，记录原因
    pub fn fail(&mut self, reason: String) {
        self.complete(StageStatus::Failed, Some(reason));
    }

    /// 跳过阶段
    pub fn skip(&mut self, reason: &str) {
        self.status = StageStatus::Skipped;
        self.message = Some(reason.to_string());
    }

    fn complete(&mut self, status: StageStatus, message: Option<String>) {
        self.status = status;
        self.message = message;
        self.duration = self.started.map(|started| started.elapsed());
    }

    /// 摘要行，如 `✓ Git Pull (120ms)`、`✗ Migrate (3012ms): migration failed: ...`
    pub fn summary_line(&self) -> String {
        let duration = self
            .duration
            .map(|d| format!("{}ms", d.as_millis()))
            .unwrap_or_else(|| "-".to_string());
        let line = format!("{} {} ({})", self.status.icon(), self.display_name, duration);
        match (&self.status, &self.message) {
            (StageStatus::Failed | StageStatus::Skipped, Some(message)) => {
                format!("{}: {}", line, message)
            }
            _ => line,
        }
    }
}

/// 将仍处于 pending 的阶段标记为跳过
pub fn skip_pending(stages: &mut [Stage], reason: &str) {
    for stage in stages
        .iter_mut()
        .filter(|s| s.status == StageStatus::Pending)
    {
        stage.skip(reason);
    }
}

/// 所有已完成阶段的耗时之和
pub fn total_duration(stages: &[Stage]) -> Duration {
    stages.iter().filter_map(|s| s.duration).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_lifecycle() {
        let mut stage = Stage::new("migrate", "Migrate");
        assert_eq!(stage.status, StageStatus::Pending);

        stage.start();
        assert_eq!(stage.status, StageStatus::Running);

        stage.fail("`docker` exited with status 1".to_string());
        assert_eq!(stage.status, StageStatus::Failed);
        assert!(stage.duration.is_some());

        let line = stage.summary_line();
        assert!(line.starts_with("✗ Migrate ("));
        assert!(line.ends_with("ms): `docker` exited with status 1"));
    }

    #[test]
    fn test_success_line_has_no_message() {
        let mut stage = Stage::new("git_pull", "Git Pull");
        stage.start();
        stage.succeed();

        assert!(stage.message.is_none());
        assert!(stage.summary_line().starts_with("✓ Git Pull ("));
        assert!(stage.summary_line().ends_with("ms)"));
    }

    #[test]
    fn test_skip_pending_leaves_finished_stages() {
        let mut stages = vec![Stage::new("a", "A"), Stage::new("b", "B")];
        stages[0].start();
        stages[0].succeed();

        skip_pending(&mut stages, "previous stage failed");

        assert_eq!(stages[0].status, StageStatus::Success);
        assert_eq!(stages[1].status, StageStatus::Skipped);
        assert_eq!(stages[1].summary_line(), "⊘ B (-): previous stage failed");
    }

    #[test]
    fn test_total_duration_ignores_unfinished() {
        let mut stages = vec![Stage::new("a", "A"), Stage::new("b", "B")];
        stages[0].start();
        stages[0].succeed();
        stages[1].skip("previous stage failed");

        assert_eq!(total_duration(&stages), stages[0].duration.unwrap());
    }
}
