//! 题目处理上下文
//!
//! 封装"我正在处理哪次运行的第几题"这一信息

use std::fmt::Display;

use tokio::time::Instant;

use crate::workflow::deadline::RunPhase;

/// 题目处理上下文
#[derive(Debug, Clone)]
pub struct QuestionCtx {
    /// 运行 ID 的短格式（仅用于日志显示）
    pub run_tag: String,

    /// 本次运行中的题目序号（从1开始）
    pub question_index: usize,

    /// 题目 URL
    pub url: String,

    pub phase: RunPhase,

    /// 单题截止时间
    pub deadline: Instant,
}

impl QuestionCtx {
    /// 创建新的题目上下文
    pub fn new(
        run_tag: String,
        question_index: usize,
        url: String,
        phase: RunPhase,
        deadline: Instant,
    ) -> Self {
        Self {
            run_tag,
            question_index,
            url,
            phase,
            deadline,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.phase == RunPhase::FallbackPending
    }
}

impl Display for QuestionCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[run {} 题目#{}]", self.run_tag, self.question_index)
    }
}
