//! 运行处理器 - 编排层
//!
//! ## 职责
//!
//! 从起始 URL 开始依次处理题目，直到完成、失败或超时。
//!
//! ## 每一轮
//!
//! 1. 根据全局截止时间判断阶段（正常 / 兜底 / 结束）
//! 2. 计算单题截止时间
//! 3. 抓取页面，并发转写音频
//! 4. 交给 `QuestionFlow` 执行尝试循环
//! 5. 根据结果完成、跳到下一题或结束

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::infrastructure::EventLog;
use crate::models::{History, PageContext, QuizRun, RunOutcome, RunReport, Transcript};
use crate::services::{CodeRunner, ContentSource, Reasoner, Submitter, Transcriber};
use crate::utils::{redact, short_id, truncate_text};
use crate::workflow::{
    next_phase, LoopState, QuestionCtx, QuestionFlow, QuestionOutcome, RunLimits, RunPhase,
};

/// 运行所需的全部业务能力
#[derive(Clone)]
pub struct QuizServices {
    pub content: Arc<dyn ContentSource>,
    pub transcriber: Arc<dyn Transcriber>,
    pub reasoner: Arc<dyn Reasoner>,
    pub runner: Arc<dyn CodeRunner>,
    pub submitter: Arc<dyn Submitter>,
    pub events: Arc<EventLog>,
}

/// 运行处理器
///
/// 自身无状态，可以同时处理多个运行；每个运行的历史和循环状态都在 `run` 内部创建
pub struct QuizRunner {
    content: Arc<dyn ContentSource>,
    transcriber: Arc<dyn Transcriber>,
    events: Arc<EventLog>,
    flow: QuestionFlow,
    limits: RunLimits,
}

impl QuizRunner {
    pub fn new(services: QuizServices, limits: RunLimits) -> Self {
        let flow = QuestionFlow::new(
            services.reasoner,
            services.runner,
            services.submitter,
            services.events.clone(),
            limits.max_attempts,
            limits.max_visual_images,
        );

        Self {
            content: services.content,
            transcriber: services.transcriber,
            events: services.events,
            flow,
            limits,
        }
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// 处理一次运行
    ///
    /// 生成代码失败等不可恢复的错误会直接返回 `Err`
    pub async fn run(&self, run: &QuizRun) -> Result<RunReport> {
        let started = Instant::now();
        let run_tag = short_id(&run.run_id);
        let mut state = LoopState::new(run.start_url.clone(), run.deadline);
        let mut history = History::new();
        let mut visited_urls = Vec::new();
        let mut attempts = Vec::new();

        info!("[run {}] 🚀 开始答题: {}", run_tag, run.start_url);

        let outcome = loop {
            let phase = next_phase(Instant::now(), &mut state);
            if phase == RunPhase::Done {
                warn!("[run {}] ⏰ 全局时间用尽", run_tag);
                break RunOutcome::TimedOut;
            }

            let question_started = Instant::now();
            let deadline = self
                .limits
                .question_deadline(phase, question_started, state.global_deadline);
            let ctx = QuestionCtx::new(
                run_tag.clone(),
                visited_urls.len() + 1,
                state.current_url.clone(),
                phase,
                deadline,
            );
            if ctx.is_fallback() {
                info!("{} 🛟 全局时间已用尽，兜底处理: {}", ctx, ctx.url);
            } else {
                info!("{} 📄 处理题目: {}", ctx, ctx.url);
            }
            visited_urls.push(ctx.url.clone());

            // ========== 抓取页面 ==========
            let page = match timeout_at(deadline, self.content.fetch(&ctx.url)).await {
                Ok(result) => result.with_context(|| format!("抓取页面失败: {}", ctx.url))?,
                Err(_) => {
                    warn!("{} ⏰ 抓取页面超时", ctx);
                    history.push_error(format!("Page fetch timed out: {}", ctx.url), 0);
                    break RunOutcome::FailedAttempts;
                }
            };
            self.record_page(run, &ctx, &page);

            // ========== 转写音频 ==========
            let transcripts = self.transcribe_all(run, &ctx, &page, &mut history).await;
            let problem_text = page.augmented_text(&transcripts);

            // ========== 尝试循环 ==========
            let report = self
                .flow
                .run(run, &ctx, &page, &problem_text, &mut history)
                .await?;
            attempts.extend(report.attempts);

            if report.outcome == QuestionOutcome::Completed {
                break RunOutcome::Completed;
            }

            match report.question_next {
                Some(next) => {
                    state.remember_next(&next);
                    state.current_url = next;
                }
                None => {
                    warn!("{} ❌ 没有可跳转的下一题", ctx);
                    break RunOutcome::FailedAttempts;
                }
            }
        };

        let elapsed = started.elapsed();
        info!(
            "[run {}] 🏁 {} (题目 {}，提交 {}，耗时 {:.1}s)",
            run_tag,
            outcome,
            visited_urls.len(),
            attempts.len(),
            elapsed.as_secs_f64()
        );

        Ok(RunReport {
            outcome,
            visited_urls,
            attempts,
            history,
            elapsed,
        })
    }

    fn record_page(&self, run: &QuizRun, ctx: &QuestionCtx, page: &PageContext) {
        self.events.record(
            "PAGE_FETCHED",
            &run.secret,
            &[
                ("run_id", ctx.run_tag.clone()),
                ("url", ctx.url.clone()),
                ("fallback", ctx.is_fallback().to_string()),
                ("text_length", page.text.chars().count().to_string()),
                ("text_preview", truncate_text(&redact(&page.text, &run.secret), 500)),
                ("audio_urls", page.audio_urls().join(", ")),
                ("data_urls", page.data_urls().join(", ")),
                ("image_urls", page.image_urls().join(", ")),
                ("screenshot", page.screenshot.is_some().to_string()),
            ],
        );
    }

    /// 并发转写页面中的全部音频
    ///
    /// 单个失败只记录到历史，不影响其它音频和本题
    async fn transcribe_all(
        &self,
        run: &QuizRun,
        ctx: &QuestionCtx,
        page: &PageContext,
        history: &mut History,
    ) -> Vec<Transcript> {
        let audio_urls = page.audio_urls();
        if audio_urls.is_empty() {
            return Vec::new();
        }
        info!("{} 🎧 转写 {} 个音频", ctx, audio_urls.len());

        let jobs = audio_urls.iter().map(|url| async move {
            let result = match timeout_at(ctx.deadline, self.transcriber.transcribe(url)).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err("timed out".to_string()),
            };
            (url, result)
        });

        let mut transcripts = Vec::new();
        for (url, result) in join_all(jobs).await {
            match result {
                Ok(text) => {
                    self.events.record(
                        "TRANSCRIPTION",
                        &run.secret,
                        &[
                            ("run_id", ctx.run_tag.clone()),
                            ("url", url.clone()),
                            ("status", "ok".to_string()),
                            ("transcript", truncate_text(&redact(&text, &run.secret), 500)),
                        ],
                    );
                    transcripts.push(Transcript {
                        url: url.clone(),
                        text,
                    });
                }
                Err(reason) => {
                    let reason = redact(&reason, &run.secret);
                    warn!("{} ⚠️ 转写失败 {}: {}", ctx, url, reason);
                    self.events.record(
                        "TRANSCRIPTION",
                        &run.secret,
                        &[
                            ("run_id", ctx.run_tag.clone()),
                            ("url", url.clone()),
                            ("status", "failed".to_string()),
                            ("error", reason.clone()),
                        ],
                    );
                    history.push_error(format!("Audio transcription failed for {}: {}", url, reason), 0);
                }
            }
        }
        transcripts
    }
}
