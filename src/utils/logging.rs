/// 日志工具模块
///
/// 提供日志初始化、格式化和脱敏的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化 tracing 日志
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info 级别。
/// 重复调用不会报错（测试中可能多次初始化）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 自动答题服务");
    info!("🧠 模型: {}", config.llm_model_name);
    info!(
        "⏱️ 总预算: {}s | 单题预算: {}s | 兜底预算: {}s",
        config.max_run_seconds, config.question_budget_seconds, config.fallback_budget_seconds
    );
    info!("📝 事件日志: {}", config.event_log_file);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// 把文本中出现的密钥替换成 `***`
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, "***")
}

/// 运行编号的短格式，用于日志前缀
pub fn short_id(run_id: &uuid::Uuid) -> String {
    run_id.simple().to_string().chars().take(8).collect()
}
