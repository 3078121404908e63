//! # Quiz Answer Machine
//!
//! 一个自动完成在线计算题的 Rust 服务：抓取题目页面、生成并执行代码、提交答案、跟随下一题
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Browser、子进程、日志文件），只暴露能力
//! - `PageRenderer` - 唯一的 Browser owner，提供 render() 能力
//! - `Sandbox` - 在独立进程中执行代码
//! - `EventLog` - 追加写入的结构化事件日志，持有提交累计
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个能力一个 trait
//! - `LlmService` - 生成代码能力
//! - `TranscriptionService` - 音频转写能力
//! - `SubmissionService` - 查找提交地址并提交答案
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一道题"的完整处理流程
//! - `QuestionCtx` - 上下文封装（run + 题目序号 + 截止时间）
//! - `QuestionFlow` - 尝试循环（generate → execute → submit）
//! - `deadline` - 全局 / 单题 / 兜底三种时间预算
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/quiz_runner` - 一次运行的外层循环
//! - `orchestrator/routes` - HTTP 入口
//! - `orchestrator/app` - 资源组装和服务监听
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::launch_headless_browser;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{EventLog, PageRenderer, Sandbox};
pub use models::{History, PageContext, QuizRun, RunOutcome, RunReport};
pub use orchestrator::{build_router, App, AppState, QuizRunner, QuizServices};
pub use workflow::{QuestionCtx, QuestionFlow, RunLimits};
