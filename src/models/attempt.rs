use serde::Serialize;

/// 代码执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// 退出码；被信号终止或无法启动时为 -1
    pub exit_status: i32,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// 提交结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionOutcome {
    pub correct: bool,
    pub next_url: Option<String>,
    pub reason: Option<String>,
}

impl SubmissionOutcome {
    /// 网络或协议错误统一转换为"回答错误"
    pub fn soft_failure(reason: impl Into<String>) -> Self {
        Self {
            correct: false,
            next_url: None,
            reason: Some(reason.into()),
        }
    }

    /// 错误原因，服务端未提供时使用默认值
    pub fn reason_or_default(&self) -> &str {
        self.reason
            .as_deref()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or("Incorrect answer")
    }
}

/// 单次尝试（生成 → 执行 → 提交）的结果
#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    /// 所属题目的 URL
    pub url: String,
    /// 尝试序号（从 1 开始）
    pub attempt: usize,
    pub code: String,
    pub execution: ExecutionResult,
    pub answer: String,
    pub submission: SubmissionOutcome,
}
