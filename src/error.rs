use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 音频转写错误
    #[error("转写错误: {0}")]
    Transcription(#[from] TranscriptionError),
    /// 代码执行环境错误
    #[error("执行环境错误: {0}")]
    Sandbox(#[from] SandboxError),
    /// 答案提交错误
    #[error("提交错误: {0}")]
    Submission(#[from] SubmissionError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {reason}")]
    LaunchFailed { reason: String },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 渲染超时
    #[error("渲染 {url} 超时 ({timeout_ms} 毫秒)")]
    RenderTimeout { url: String, timeout_ms: u64 },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 音频转写错误
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// 下载音频失败
    #[error("下载音频失败 ({url}): {message}")]
    DownloadFailed { url: String, message: String },
    /// 转写接口返回错误
    #[error("转写接口返回错误 (状态码: {status}): {body}")]
    BadResponse { status: u16, body: String },
    /// 转写结果为空
    #[error("转写结果为空: {url}")]
    EmptyTranscript { url: String },
    /// 格式转换失败
    #[error("音频格式转换失败: {message}")]
    ConversionFailed { message: String },
}

/// 代码执行环境错误
#[derive(Debug, Error)]
pub enum SandboxError {
    /// 启动子进程失败
    #[error("无法启动解释器 {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// 答案提交错误
///
/// 提交失败不会中断流程，这些错误只会被转换成带原因的"回答错误"结果
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// 页面中找不到提交地址
    #[error("Could not identify submission endpoint from page text.")]
    EndpointNotFound,
    /// 网络请求失败
    #[error("Error submitting answer: {message}")]
    RequestFailed { message: String },
    /// 返回的不是合法 JSON
    #[error("Invalid response from submission endpoint (status {status}): {message}")]
    InvalidResponse { status: u16, message: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 缺少必需的配置项
    #[error("缺少必需的配置项: {field}")]
    Missing { field: String },
    /// 配置项取值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    Invalid { field: String, reason: String },
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
