//! 测试用的业务能力替身
//!
//! 每个替身按脚本返回结果，并记录收到的调用，供断言使用

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use quiz_answer_machine::infrastructure::EventLog;
use quiz_answer_machine::models::{
    ExecutionResult, PageContext, PageResources, QuizRun, SubmissionOutcome,
};
use quiz_answer_machine::services::{
    CodeRequest, CodeRunner, ContentSource, Reasoner, Submission, Submitter, Transcriber,
};
use quiz_answer_machine::{QuizRunner, QuizServices, RunLimits};

pub const EMAIL: &str = "student@example.com";
pub const SECRET: &str = "s3cret-token-value";

pub fn limits() -> RunLimits {
    RunLimits {
        run_budget: Duration::from_secs(170),
        question_budget: Duration::from_secs(90),
        fallback_budget: Duration::from_secs(60),
        max_attempts: 3,
        max_visual_images: 3,
    }
}

pub fn quiz_run(start_url: &str) -> QuizRun {
    QuizRun::new(start_url, EMAIL, SECRET, limits().run_budget)
}

pub fn page(url: &str, text: &str) -> PageContext {
    PageContext {
        url: url.to_string(),
        text: text.to_string(),
        html: String::new(),
        screenshot: None,
        resources: PageResources::default(),
    }
}

pub fn correct(next: Option<&str>) -> SubmissionOutcome {
    SubmissionOutcome {
        correct: true,
        next_url: next.map(str::to_string),
        reason: None,
    }
}

pub fn incorrect(reason: Option<&str>, next: Option<&str>) -> SubmissionOutcome {
    SubmissionOutcome {
        correct: false,
        next_url: next.map(str::to_string),
        reason: reason.map(str::to_string),
    }
}

// ========== 页面 ==========

#[derive(Default)]
pub struct MockContent {
    pages: HashMap<String, PageContext>,
    pub fetched: Mutex<Vec<String>>,
}

impl MockContent {
    pub fn new(pages: Vec<PageContext>) -> Self {
        Self {
            pages: pages.into_iter().map(|p| (p.url.clone(), p)).collect(),
            fetched: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ContentSource for MockContent {
    async fn fetch(&self, url: &str) -> Result<PageContext> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("unknown page: {}", url))
    }
}

// ========== 转写 ==========

#[derive(Default)]
pub struct MockTranscriber {
    results: HashMap<String, Result<String, String>>,
}

impl MockTranscriber {
    pub fn new(results: Vec<(&str, Result<&str, &str>)>) -> Self {
        Self {
            results: results
                .into_iter()
                .map(|(url, r)| (url.to_string(), r.map(str::to_string).map_err(str::to_string)))
                .collect(),
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio_url: &str) -> Result<String> {
        match self.results.get(audio_url) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(reason)) => Err(anyhow!(reason.clone())),
            None => Err(anyhow!("no transcript scripted")),
        }
    }
}

// ========== 推理 ==========

/// 推理替身收到的请求
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub url: String,
    pub problem_text: String,
    pub history_len: usize,
    pub history_json: String,
    pub has_screenshot: bool,
    pub image_urls: Vec<String>,
}

#[derive(Default)]
pub struct MockReasoner {
    pub delay: Duration,
    pub fail: bool,
    pub requests: Mutex<Vec<SeenRequest>>,
}

impl MockReasoner {
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Reasoner for MockReasoner {
    async fn generate_code(&self, request: CodeRequest<'_>) -> Result<String> {
        self.requests.lock().unwrap().push(SeenRequest {
            url: request.url.to_string(),
            problem_text: request.problem_text.to_string(),
            history_len: request.history.len(),
            history_json: request.history.to_prompt_json(),
            has_screenshot: request.screenshot.is_some(),
            image_urls: request.image_urls.to_vec(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(anyhow!("model returned no content"));
        }
        Ok("print(42)".to_string())
    }
}

// ========== 执行 ==========

#[derive(Default)]
pub struct MockRunner {
    script: Mutex<VecDeque<Result<ExecutionResult, String>>>,
    pub codes: Mutex<Vec<String>>,
}

impl MockRunner {
    pub fn scripted(script: Vec<Result<ExecutionResult, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            codes: Mutex::new(Vec::new()),
        }
    }

    pub fn codes(&self) -> Vec<String> {
        self.codes.lock().unwrap().clone()
    }
}

pub fn ok_output(stdout: &str) -> Result<ExecutionResult, String> {
    Ok(ExecutionResult {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_status: 0,
    })
}

pub fn failed_output(stderr: &str) -> Result<ExecutionResult, String> {
    Ok(ExecutionResult {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_status: 1,
    })
}

#[async_trait]
impl CodeRunner for MockRunner {
    async fn execute(&self, code: &str) -> Result<ExecutionResult> {
        self.codes.lock().unwrap().push(code.to_string());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(result)) => Ok(result),
            Some(Err(reason)) => Err(anyhow!(reason)),
            None => Ok(ExecutionResult {
                stdout: " 42\n".to_string(),
                stderr: String::new(),
                exit_status: 0,
            }),
        }
    }
}

// ========== 提交 ==========

/// 提交替身收到的提交
#[derive(Debug, Clone)]
pub struct SeenSubmission {
    pub page_url: String,
    pub page_text: String,
    pub answer: String,
}

/// 按页面 URL 编排的提交结果：(耗时, 结果)
#[derive(Default)]
pub struct MockSubmitter {
    script: Mutex<HashMap<String, VecDeque<(Duration, SubmissionOutcome)>>>,
    pub seen: Mutex<Vec<SeenSubmission>>,
}

impl MockSubmitter {
    pub fn scripted(script: Vec<(&str, Vec<(Duration, SubmissionOutcome)>)>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|(url, outcomes)| (url.to_string(), outcomes.into()))
                    .collect(),
            ),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<SeenSubmission> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Submitter for MockSubmitter {
    async fn submit(&self, submission: Submission<'_>) -> SubmissionOutcome {
        self.seen.lock().unwrap().push(SeenSubmission {
            page_url: submission.page_url.to_string(),
            page_text: submission.page_text.to_string(),
            answer: submission.answer.to_string(),
        });
        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(submission.page_url)
            .and_then(|queue| queue.pop_front());

        match next {
            Some((delay, outcome)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                outcome
            }
            None => incorrect(Some("Wrong answer"), None),
        }
    }
}

// ========== 组装 ==========

pub struct Harness {
    pub content: Arc<MockContent>,
    pub transcriber: Arc<MockTranscriber>,
    pub reasoner: Arc<MockReasoner>,
    pub runner: Arc<MockRunner>,
    pub submitter: Arc<MockSubmitter>,
    pub events: Arc<EventLog>,
}

impl Harness {
    pub fn new(pages: Vec<PageContext>, submitter: MockSubmitter) -> Self {
        Self {
            content: Arc::new(MockContent::new(pages)),
            transcriber: Arc::new(MockTranscriber::default()),
            reasoner: Arc::new(MockReasoner::default()),
            runner: Arc::new(MockRunner::default()),
            submitter: Arc::new(submitter),
            events: Arc::new(EventLog::discard()),
        }
    }

    pub fn with_reasoner(mut self, reasoner: MockReasoner) -> Self {
        self.reasoner = Arc::new(reasoner);
        self
    }

    pub fn with_runner(mut self, runner: MockRunner) -> Self {
        self.runner = Arc::new(runner);
        self
    }

    pub fn with_transcriber(mut self, transcriber: MockTranscriber) -> Self {
        self.transcriber = Arc::new(transcriber);
        self
    }

    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Arc::new(events);
        self
    }

    pub fn quiz_runner(&self) -> QuizRunner {
        let services = QuizServices {
            content: self.content.clone(),
            transcriber: self.transcriber.clone(),
            reasoner: self.reasoner.clone(),
            runner: self.runner.clone(),
            submitter: self.submitter.clone(),
            events: self.events.clone(),
        };
        QuizRunner::new(services, limits())
    }
}
