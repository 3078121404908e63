//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **资源初始化**：启动无头浏览器、创建事件日志和各项业务能力
//! 2. **组装**：把业务能力交给 `QuizRunner`
//! 3. **服务**：监听 HTTP 请求，每个请求在后台独立运行
//!
//! 唯一持有 Browser 的模块是 `PageRenderer`，App 只负责创建它

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::browser;
use crate::config::Config;
use crate::infrastructure::{EventLog, PageRenderer, Sandbox};
use crate::orchestrator::quiz_runner::{QuizRunner, QuizServices};
use crate::orchestrator::routes::{build_router, AppState};
use crate::services::{LlmService, SubmissionService, TranscriptionService};
use crate::utils::logging;
use crate::workflow::RunLimits;

/// 应用主结构
pub struct App {
    config: Arc<Config>,
    runner: Arc<QuizRunner>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::log_startup(&config);

        let events = Arc::new(EventLog::new(&config.event_log_file));

        let browser = browser::launch_headless_browser(config.chrome_executable.as_deref()).await?;
        let renderer = PageRenderer::new(browser, config.browser_timeout());

        let services = QuizServices {
            content: Arc::new(renderer),
            transcriber: Arc::new(TranscriptionService::new(&config, config.question_budget())?),
            reasoner: Arc::new(LlmService::new(&config, events.clone())),
            runner: Arc::new(Sandbox::new(config.python_bin.clone())),
            submitter: Arc::new(SubmissionService::new(config.question_budget(), events.clone())?),
            events,
        };

        let runner = QuizRunner::new(services, RunLimits::from_config(&config));

        Ok(Self {
            config: Arc::new(config),
            runner: Arc::new(runner),
        })
    }

    /// 运行 HTTP 服务，直到进程退出
    pub async fn run(self) -> Result<()> {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            runner: self.runner,
        });
        let router = build_router(state);

        let listener = tokio::net::TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("无法监听地址: {}", self.config.listen_addr))?;
        info!("🌐 正在监听 http://{}", self.config.listen_addr);

        axum::serve(listener, router).await?;
        Ok(())
    }
}
