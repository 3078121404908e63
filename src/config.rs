//! 程序配置
//!
//! 加载顺序：默认值 → TOML 文件（可选）→ 环境变量

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::{AppError, ConfigError};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_FILE: &str = "quiz.toml";

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_api_key: String,
    /// 模型端点覆盖（为空时使用 OpenAI 官方端点）
    pub llm_api_base_url: Option<String>,
    pub llm_model_name: String,
    pub transcription_model_name: String,
    // --- 鉴权 ---
    /// 触发请求必须携带的密钥
    pub student_secret: String,
    // --- 时间预算 ---
    /// 单次运行的总时间预算（秒）
    pub max_run_seconds: u64,
    /// 单道题目的时间预算（秒）
    pub question_budget_seconds: u64,
    /// 全局超时后兜底题目的时间预算（秒）
    pub fallback_budget_seconds: u64,
    /// 每道题的最大尝试次数
    pub max_attempts: usize,
    /// 每次请求附带的最大图片数量
    pub max_visual_images: usize,
    // --- 浏览器 ---
    /// 页面渲染超时（毫秒）
    pub browser_timeout_ms: u64,
    pub chrome_executable: Option<String>,
    // --- 执行环境 ---
    pub python_bin: String,
    // --- 服务 ---
    pub listen_addr: String,
    /// 结构化事件日志文件
    pub event_log_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: None,
            llm_model_name: "gpt-5.1".to_string(),
            transcription_model_name: "gpt-4o-mini-transcribe".to_string(),
            student_secret: String::new(),
            max_run_seconds: 170,
            question_budget_seconds: 90,
            fallback_budget_seconds: 60,
            max_attempts: 3,
            max_visual_images: 3,
            browser_timeout_ms: 30_000,
            chrome_executable: None,
            python_bin: "python3".to_string(),
            listen_addr: "0.0.0.0:8000".to_string(),
            event_log_file: "logs/agent.log".to_string(),
            verbose_logging: false,
        }
    }
}

/// TOML 文件中的配置，所有字段均可省略
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    llm_api_key: Option<String>,
    llm_api_base_url: Option<String>,
    llm_model_name: Option<String>,
    transcription_model_name: Option<String>,
    student_secret: Option<String>,
    max_run_seconds: Option<u64>,
    question_budget_seconds: Option<u64>,
    fallback_budget_seconds: Option<u64>,
    max_attempts: Option<usize>,
    max_visual_images: Option<usize>,
    browser_timeout_ms: Option<u64>,
    chrome_executable: Option<String>,
    python_bin: Option<String>,
    listen_addr: Option<String>,
    event_log_file: Option<String>,
    verbose_logging: Option<bool>,
}

impl Config {
    /// 按 默认值 → TOML 文件 → 环境变量 的顺序加载配置
    pub fn load() -> Result<Self> {
        let path = std::env::var("QUIZ_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = if Path::new(&path).exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("无法读取配置文件: {}", path))?;
            Self::from_toml_str(&content).with_context(|| format!("无法解析配置文件: {}", path))?
        } else {
            Self::default()
        };

        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 在默认值之上应用 TOML 内容
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)?;
        let d = Self::default();
        Ok(Self {
            llm_api_key: file.llm_api_key.unwrap_or(d.llm_api_key),
            llm_api_base_url: file.llm_api_base_url.or(d.llm_api_base_url),
            llm_model_name: file.llm_model_name.unwrap_or(d.llm_model_name),
            transcription_model_name: file
                .transcription_model_name
                .unwrap_or(d.transcription_model_name),
            student_secret: file.student_secret.unwrap_or(d.student_secret),
            max_run_seconds: file.max_run_seconds.unwrap_or(d.max_run_seconds),
            question_budget_seconds: file
                .question_budget_seconds
                .unwrap_or(d.question_budget_seconds),
            fallback_budget_seconds: file
                .fallback_budget_seconds
                .unwrap_or(d.fallback_budget_seconds),
            max_attempts: file.max_attempts.unwrap_or(d.max_attempts),
            max_visual_images: file.max_visual_images.unwrap_or(d.max_visual_images),
            browser_timeout_ms: file.browser_timeout_ms.unwrap_or(d.browser_timeout_ms),
            chrome_executable: file.chrome_executable.or(d.chrome_executable),
            python_bin: file.python_bin.unwrap_or(d.python_bin),
            listen_addr: file.listen_addr.unwrap_or(d.listen_addr),
            event_log_file: file.event_log_file.unwrap_or(d.event_log_file),
            verbose_logging: file.verbose_logging.unwrap_or(d.verbose_logging),
        })
    }

    /// 只使用默认值和环境变量
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 用环境变量覆盖当前配置，无法解析的数值保持原值
    pub fn with_env_overrides(self) -> Self {
        Self::apply_overrides(self, |name| std::env::var(name).ok())
    }

    fn apply_overrides(self, var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            llm_api_key: var("OPENAI_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: var("OPENAI_BASE_URL")
                .filter(|v| !v.trim().is_empty())
                .or(self.llm_api_base_url),
            llm_model_name: var("OPENAI_MODEL").unwrap_or(self.llm_model_name),
            transcription_model_name: var("OPENAI_TRANSCRIPTION_MODEL")
                .unwrap_or(self.transcription_model_name),
            student_secret: var("STUDENT_SECRET").unwrap_or(self.student_secret),
            max_run_seconds: parse_var(&var, "MAX_RUN_SECONDS").unwrap_or(self.max_run_seconds),
            question_budget_seconds: parse_var(&var, "QUESTION_BUDGET_SECONDS")
                .unwrap_or(self.question_budget_seconds),
            fallback_budget_seconds: parse_var(&var, "FALLBACK_BUDGET_SECONDS")
                .unwrap_or(self.fallback_budget_seconds),
            max_attempts: self.max_attempts,
            max_visual_images: self.max_visual_images,
            browser_timeout_ms: parse_var(&var, "BROWSER_TIMEOUT_MS").unwrap_or(self.browser_timeout_ms),
            chrome_executable: var("CHROME_EXECUTABLE").or(self.chrome_executable),
            python_bin: var("PYTHON_BIN").unwrap_or(self.python_bin),
            listen_addr: var("LISTEN_ADDR").unwrap_or(self.listen_addr),
            event_log_file: var("EVENT_LOG_FILE").unwrap_or(self.event_log_file),
            verbose_logging: parse_var(&var, "VERBOSE_LOGGING").unwrap_or(self.verbose_logging),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |field: &str, reason: &str| {
            AppError::Config(ConfigError::Invalid {
                field: field.to_string(),
                reason: reason.to_string(),
            })
        };

        if self.student_secret.trim().is_empty() {
            return Err(AppError::Config(ConfigError::Missing {
                field: "student_secret".to_string(),
            }));
        }
        if self.llm_api_key.trim().is_empty() {
            return Err(AppError::Config(ConfigError::Missing {
                field: "llm_api_key".to_string(),
            }));
        }
        if self.max_run_seconds == 0 {
            return Err(invalid("max_run_seconds", "必须大于 0"));
        }
        if self.question_budget_seconds == 0 {
            return Err(invalid("question_budget_seconds", "必须大于 0"));
        }
        if self.fallback_budget_seconds == 0 {
            return Err(invalid("fallback_budget_seconds", "必须大于 0"));
        }
        if self.fallback_budget_seconds > self.question_budget_seconds {
            return Err(invalid("fallback_budget_seconds", "不能大于 question_budget_seconds"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "必须大于 0"));
        }
        Ok(())
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.max_run_seconds)
    }

    pub fn question_budget(&self) -> Duration {
        Duration::from_secs(self.question_budget_seconds)
    }

    pub fn fallback_budget(&self) -> Duration {
        Duration::from_secs(self.fallback_budget_seconds)
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_millis(self.browser_timeout_ms)
    }
}

fn parse_var<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    var(name).and_then(|v| v.trim().parse().ok())
}
