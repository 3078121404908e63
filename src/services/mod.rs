//! 业务能力层
//!
//! 每个能力用一个 trait 描述"我能做什么"，编排层只依赖这些 trait。
//! 生产实现：
//! - `ContentSource` → [`crate::infrastructure::PageRenderer`]
//! - `Transcriber` → [`TranscriptionService`]
//! - `Reasoner` → [`LlmService`]
//! - `CodeRunner` → [`crate::infrastructure::Sandbox`]
//! - `Submitter` → [`SubmissionService`]

pub mod llm_service;
pub mod submission;
pub mod transcription;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ExecutionResult, History, PageContext, SubmissionOutcome};

pub use llm_service::{finalize_answer, LlmService};
pub use submission::{locate_endpoint, SubmissionService};
pub use transcription::TranscriptionService;

/// 生成代码所需的上下文
#[derive(Debug, Clone, Copy)]
pub struct CodeRequest<'a> {
    /// 追加了转写和资源提示的题目文本
    pub problem_text: &'a str,
    pub history: &'a History,
    pub url: &'a str,
    /// 调用方身份（邮箱）
    pub identity: &'a str,
    /// 本次运行的密钥，只用于日志脱敏，不进入提示词
    pub secret: &'a str,
    /// 整页截图（PNG），第一次尝试时为空
    pub screenshot: Option<&'a [u8]>,
    pub image_urls: &'a [String],
}

/// 一次答案提交
#[derive(Clone, Copy)]
pub struct Submission<'a> {
    /// 页面原始文本（不含追加内容），用于查找提交地址
    pub page_text: &'a str,
    pub page_url: &'a str,
    pub email: &'a str,
    pub secret: &'a str,
    pub answer: &'a str,
}

/// 页面抓取能力
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageContext>;
}

/// 音频转写能力
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_url: &str) -> Result<String>;
}

/// 推理能力
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// 生成候选代码；模型没有可用输出时返回错误
    async fn generate_code(&self, request: CodeRequest<'_>) -> Result<String>;

    /// 把执行输出规整为最终答案，不会失败
    fn finalize_answer(&self, raw_output: &str) -> String {
        finalize_answer(raw_output)
    }
}

/// 代码执行能力
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn execute(&self, code: &str) -> Result<ExecutionResult>;
}

/// 答案提交能力
///
/// 永远返回结构完整的结果：网络或协议错误转换为带原因的"回答错误"
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, submission: Submission<'_>) -> SubmissionOutcome;
}
