//! 一次运行（从起始 URL 开始的完整答题过程）

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use super::{AttemptResult, History};

/// 一次运行的输入
///
/// `secret` 只用于提交答案，`Debug` 输出中会被隐藏
#[derive(Clone)]
pub struct QuizRun {
    pub run_id: Uuid,
    pub start_url: String,
    pub email: String,
    pub secret: String,
    /// 全局截止时间
    pub deadline: Instant,
}

impl QuizRun {
    /// 从现在开始计算全局截止时间
    pub fn new(
        start_url: impl Into<String>,
        email: impl Into<String>,
        secret: impl Into<String>,
        budget: Duration,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            start_url: start_url.into(),
            email: email.into(),
            secret: secret.into(),
            deadline: Instant::now() + budget,
        }
    }
}

impl fmt::Debug for QuizRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizRun")
            .field("run_id", &self.run_id)
            .field("start_url", &self.start_url)
            .field("email", &self.email)
            .field("secret", &"***")
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// 运行的终止结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 答对且没有下一题
    Completed,
    /// 尝试次数或单题时间用尽，且没有可跳转的下一题
    FailedAttempts,
    /// 全局时间用尽
    TimedOut,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Completed => "quiz completed",
            RunOutcome::FailedAttempts => "failed to solve within attempts",
            RunOutcome::TimedOut => "timed out before completing",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 运行报告
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// 依次处理过的题目 URL
    pub visited_urls: Vec<String>,
    /// 全部尝试，按时间顺序
    pub attempts: Vec<AttemptResult>,
    /// 终止时的错误历史
    pub history: History,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn submissions(&self) -> usize {
        self.attempts.len()
    }
}
