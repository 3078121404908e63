//! 基础设施层
//!
//! 持有稀缺资源（浏览器、子进程、日志文件），只暴露能力，不认识题目流程

pub mod event_log;
pub mod html_scan;
pub mod page_renderer;
pub mod sandbox;

pub use event_log::{EventLog, SubmissionTally};
pub use html_scan::scan_resources;
pub use page_renderer::PageRenderer;
pub use sandbox::Sandbox;
