//! 题目处理流程 - 流程层
//!
//! 核心职责：定义"一道题"的尝试循环
//!
//! 每次尝试：
//! 1. 生成代码（第一次尝试不带视觉上下文）
//! 2. 注入页面变量后执行
//! 3. 规整输出为答案
//! 4. 用原始页面文本提交
//!
//! 尝试次数用尽或单题截止时间到达时结束

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::infrastructure::EventLog;
use crate::models::{AttemptResult, ExecutionResult, History, PageContext, QuizRun, SubmissionOutcome};
use crate::services::{CodeRequest, CodeRunner, Reasoner, Submission, Submitter};
use crate::utils::{redact, truncate_text};
use crate::workflow::prompt::wrap_code;
use crate::workflow::question_ctx::QuestionCtx;

/// 写入历史的错误信息最大长度
const HISTORY_MESSAGE_LIMIT: usize = 500;

/// 题目处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionOutcome {
    /// 答对且没有下一题
    Completed,
    /// 答对并给出下一题（历史已清空）
    Solved,
    /// 尝试次数或单题时间用尽
    Unsolved,
}

/// 一道题的处理报告
#[derive(Debug, Clone)]
pub struct QuestionReport {
    pub outcome: QuestionOutcome,
    pub attempts: Vec<AttemptResult>,
    /// 本题最后见到的下一题地址
    pub question_next: Option<String>,
}

/// 题目处理流程
///
/// - 编排单道题的尝试循环
/// - 决定何时附带视觉上下文、何时记录历史、何时结束
/// - 不持有任何资源，只依赖业务能力（services）
pub struct QuestionFlow {
    reasoner: Arc<dyn Reasoner>,
    runner: Arc<dyn CodeRunner>,
    submitter: Arc<dyn Submitter>,
    events: Arc<EventLog>,
    max_attempts: usize,
    max_visual_images: usize,
}

impl QuestionFlow {
    /// 创建新的题目处理流程
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        runner: Arc<dyn CodeRunner>,
        submitter: Arc<dyn Submitter>,
        events: Arc<EventLog>,
        max_attempts: usize,
        max_visual_images: usize,
    ) -> Self {
        Self {
            reasoner,
            runner,
            submitter,
            events,
            max_attempts,
            max_visual_images,
        }
    }

    /// 运行尝试循环
    ///
    /// `problem_text` 是追加了转写和资源提示的文本，只用于推理；
    /// 提交时使用 `page.text`。生成代码失败会直接返回错误。
    pub async fn run(
        &self,
        run: &QuizRun,
        ctx: &QuestionCtx,
        page: &PageContext,
        problem_text: &str,
        history: &mut History,
    ) -> Result<QuestionReport> {
        let mut attempts = Vec::new();
        let mut question_next: Option<String> = None;
        let mut attempt = 0;

        while attempt < self.max_attempts && Instant::now() < ctx.deadline {
            attempt += 1;
            info!("{} 🧪 第 {}/{} 次尝试", ctx, attempt, self.max_attempts);

            // ========== 1. 生成代码 ==========
            let with_visuals = attempt > 1;
            let screenshot = if with_visuals { page.screenshot.as_deref() } else { None };
            let image_urls: &[String] = if with_visuals {
                let images = page.image_urls();
                &images[..images.len().min(self.max_visual_images)]
            } else {
                &[]
            };

            let request = CodeRequest {
                problem_text,
                history: &*history,
                url: &ctx.url,
                identity: &run.email,
                secret: &run.secret,
                screenshot,
                image_urls,
            };

            let generated = timeout_at(ctx.deadline, self.reasoner.generate_code(request)).await;
            let code = match generated {
                Ok(result) => result.with_context(|| format!("生成代码失败: {}", ctx.url))?,
                Err(_) => {
                    warn!("{} ⏰ 生成代码超时", ctx);
                    history.push_error(format!("Code generation timed out on attempt {}", attempt), attempt);
                    break;
                }
            };

            // ========== 2. 执行 ==========
            let wrapped = wrap_code(&code, problem_text, &ctx.url, page.data_urls());
            let execution = match timeout_at(ctx.deadline, self.runner.execute(&wrapped)).await {
                Ok(Ok(execution)) => execution,
                Ok(Err(e)) => {
                    warn!("{} ❌ 无法执行代码: {}", ctx, e);
                    ExecutionResult {
                        stdout: String::new(),
                        stderr: e.to_string(),
                        exit_status: -1,
                    }
                }
                Err(_) => {
                    warn!("{} ⏰ 执行代码超时", ctx);
                    history.push_execution_failure(
                        format!("Code execution timed out on attempt {}", attempt),
                        attempt,
                    );
                    break;
                }
            };

            self.events.record(
                "CODE_EXECUTED",
                &run.secret,
                &[
                    ("run_id", ctx.run_tag.clone()),
                    ("url", ctx.url.clone()),
                    ("attempt", attempt.to_string()),
                    ("exit_status", execution.exit_status.to_string()),
                    ("stdout", truncate_text(&redact(&execution.stdout, &run.secret), HISTORY_MESSAGE_LIMIT)),
                    ("stderr", truncate_text(&redact(&execution.stderr, &run.secret), HISTORY_MESSAGE_LIMIT)),
                ],
            );

            if !execution.success() {
                let detail = if execution.stderr.trim().is_empty() {
                    format!("exit status {}", execution.exit_status)
                } else {
                    execution.stderr.clone()
                };
                history.push_execution_failure(
                    truncate_text(&redact(&detail, &run.secret), HISTORY_MESSAGE_LIMIT),
                    attempt,
                );
            }

            // ========== 3. 规整答案 ==========
            let answer = self.reasoner.finalize_answer(&execution.stdout);
            info!("{} 📝 答案: {}", ctx, truncate_text(&redact(&answer, &run.secret), 100));

            // ========== 4. 提交 ==========
            let submission = Submission {
                page_text: &page.text,
                page_url: &ctx.url,
                email: &run.email,
                secret: &run.secret,
                answer: &answer,
            };
            let outcome = match timeout_at(ctx.deadline, self.submitter.submit(submission)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("{} ⏰ 提交超时", ctx);
                    SubmissionOutcome::soft_failure("Submission timed out")
                }
            };

            let tally = self.events.record_submission(
                outcome.correct,
                &run.secret,
                &[
                    ("run_id", ctx.run_tag.clone()),
                    ("url", ctx.url.clone()),
                    ("attempt", attempt.to_string()),
                    ("answer", answer.clone()),
                    ("next_url", outcome.next_url.clone().unwrap_or_default()),
                    ("reason", outcome.reason.clone().unwrap_or_default()),
                ],
            );
            info!(
                "{} {} 提交结果: correct={} (累计 ✓{} ✗{})",
                ctx,
                if outcome.correct { "✅" } else { "❌" },
                outcome.correct,
                tally.correct,
                tally.incorrect
            );

            attempts.push(AttemptResult {
                url: ctx.url.clone(),
                attempt,
                code,
                execution,
                answer,
                submission: outcome.clone(),
            });

            if outcome.correct {
                match outcome.next_url {
                    Some(next) => {
                        info!("{} ➡️ 进入下一题: {}", ctx, next);
                        question_next = Some(next);
                        history.clear();
                        return Ok(QuestionReport {
                            outcome: QuestionOutcome::Solved,
                            attempts,
                            question_next,
                        });
                    }
                    None => {
                        info!("{} 🎉 全部完成", ctx);
                        return Ok(QuestionReport {
                            outcome: QuestionOutcome::Completed,
                            attempts,
                            question_next: None,
                        });
                    }
                }
            }

            history.push_error(redact(outcome.reason_or_default(), &run.secret), attempt);
            if let Some(next) = outcome.next_url {
                // 不立即跳转，继续重试当前题目
                question_next = Some(next);
            }
        }

        if Instant::now() >= ctx.deadline {
            warn!("{} ⏰ 单题时间用尽，共尝试 {} 次", ctx, attempt);
        } else {
            warn!("{} ⚠️ 尝试次数用尽", ctx);
        }

        Ok(QuestionReport {
            outcome: QuestionOutcome::Unsolved,
            attempts,
            question_next,
        })
    }
}
