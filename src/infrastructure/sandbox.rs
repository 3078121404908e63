//! 代码执行器 - 基础设施层
//!
//! 每次调用启动一个全新的解释器进程，调用之间不共享任何状态

use std::ffi::OsString;
use std::process::Stdio;

use anyhow::Result;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::SandboxError;
use crate::models::ExecutionResult;
use crate::services::CodeRunner;

/// 输出截断上限（字节）
pub const MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// 名称中包含这些片段的环境变量不会传给子进程
const DENIED_ENV_FRAGMENTS: &[&str] = &["SECRET", "API_KEY", "TOKEN", "PASSWORD"];

/// 子进程执行器
///
/// 职责：
/// - 以 `<program> -c <code>` 方式运行代码
/// - 捕获 stdout / stderr / 退出码
/// - 不认识题目，也不处理流程
///
/// 自身不设超时；调用方丢弃 future 时子进程会被杀掉（`kill_on_drop`）
pub struct Sandbox {
    program: String,
}

impl Sandbox {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// 运行代码并等待结束
    pub async fn run(&self, code: &str) -> Result<ExecutionResult, SandboxError> {
        debug!("启动 {}，代码长度: {} 字符", self.program, code.len());

        let mut command = Command::new(&self.program);
        command
            .arg("-c")
            .arg(code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for key in denied_env_keys(std::env::vars_os().map(|(key, _)| key)) {
            command.env_remove(key);
        }

        let output = command.output().await.map_err(|source| SandboxError::SpawnFailed {
            program: self.program.clone(),
            source,
        })?;

        let result = ExecutionResult {
            stdout: truncate_to_limit(&output.stdout, MAX_OUTPUT_BYTES),
            stderr: truncate_to_limit(&output.stderr, MAX_OUTPUT_BYTES),
            exit_status: output.status.code().unwrap_or(-1),
        };

        debug!(
            "执行结束，退出码: {}，stdout {} 字节，stderr {} 字节",
            result.exit_status,
            result.stdout.len(),
            result.stderr.len()
        );

        Ok(result)
    }
}

#[async_trait]
impl CodeRunner for Sandbox {
    async fn execute(&self, code: &str) -> Result<ExecutionResult> {
        Ok(self.run(code).await?)
    }
}

fn truncate_to_limit(bytes: &[u8], limit: usize) -> String {
    let slice = if bytes.len() > limit { &bytes[..limit] } else { bytes };
    String::from_utf8_lossy(slice).into_owned()
}

/// 需要从子进程环境中移除的变量名，非 UTF-8 的变量名按有损方式比较
fn denied_env_keys(keys: impl Iterator<Item = OsString>) -> Vec<OsString> {
    keys.filter(|key| {
        let upper = key.to_string_lossy().to_ascii_uppercase();
        DENIED_ENV_FRAGMENTS.iter().any(|fragment| upper.contains(fragment))
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 用 sh 代替 python，保证测试环境无需安装解释器

    #[tokio::test]
    async fn test_captures_stdout() {
        let sandbox = Sandbox::new("sh");
        let result = sandbox.run("echo 42").await.unwrap();
        assert_eq!(result.stdout, "42\n");
        assert!(result.success());
    }

    #[tokio::test]
    async fn test_nonzero_exit_keeps_output() {
        let sandbox = Sandbox::new("sh");
        let result = sandbox.run("echo partial; echo oops >&2; exit 3").await.unwrap();
        assert_eq!(result.exit_status, 3);
        assert_eq!(result.stdout, "partial\n");
        assert_eq!(result.stderr, "oops\n");
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_secret_env_is_not_inherited() {
        std::env::set_var("QUIZ_TEST_SECRET_VALUE", "leak-me");
        let sandbox = Sandbox::new("sh");
        let result = sandbox
            .run("printf '%s' \"${QUIZ_TEST_SECRET_VALUE:-absent}\"")
            .await
            .unwrap();
        assert_eq!(result.stdout, "absent");
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let sandbox = Sandbox::new("definitely-not-an-interpreter-xyz");
        let err = sandbox.run("print(1)").await.unwrap_err();
        assert!(matches!(err, SandboxError::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_denied_env_keys_tolerates_non_utf8_names() {
        use std::os::unix::ffi::OsStringExt;

        let keys = vec![
            OsString::from("PATH"),
            OsString::from("openai_api_key"),
            OsString::from_vec(b"BAD_\xff_TOKEN".to_vec()),
            OsString::from_vec(b"PLAIN_\xfe".to_vec()),
        ];

        let denied = denied_env_keys(keys.into_iter());
        assert_eq!(denied.len(), 2);
        assert_eq!(denied[0], OsString::from("openai_api_key"));
        assert_eq!(denied[1], OsString::from_vec(b"BAD_\xff_TOKEN".to_vec()));
    }

    #[test]
    fn test_truncate_to_limit() {
        assert_eq!(truncate_to_limit(b"abcdef", 3), "abc");
        assert_eq!(truncate_to_limit(b"ab", 3), "ab");
    }
}
