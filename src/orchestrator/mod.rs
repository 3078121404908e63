//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责运行调度和资源组装，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、监听）
//! - 创建浏览器、事件日志和各项业务能力
//!
//! ### `routes` - HTTP 入口
//! - 校验密钥，拒绝无效请求
//! - 在后台启动运行，立即返回
//!
//! ### `quiz_runner` - 运行处理器
//! - 外层循环：阶段判断、单题截止时间、兜底题目
//! - 抓取页面、并发转写音频
//! - 把每道题交给 QuestionFlow
//!
//! ## 层次关系
//!
//! ```text
//! routes (处理 HTTP 请求)
//!     ↓
//! quiz_runner (处理一次运行，多道题)
//!     ↓
//! workflow::QuestionFlow (处理单道题的尝试循环)
//!     ↓
//! services (能力层：reasoning / transcription / submission)
//!     ↓
//! infrastructure (基础设施：PageRenderer / Sandbox / EventLog)
//! ```

pub mod app;
pub mod quiz_runner;
pub mod routes;

// 重新导出主要类型
pub use app::App;
pub use quiz_runner::{QuizRunner, QuizServices};
pub use routes::{build_router, execute_run, AppState, RunRequest};
