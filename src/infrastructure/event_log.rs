//! 结构化事件日志 - 基础设施层
//!
//! 追加写入，只用于事后排查，系统不会回读。
//! 每条记录格式：
//!
//! ```text
//! Event type: <TYPE>
//! (<ISO-8601 UTC 时间戳>)
//! key: value
//! -----
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::utils::redact;

/// 提交结果累计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmissionTally {
    pub correct: usize,
    pub incorrect: usize,
}

/// 事件日志
///
/// 职责：
/// - 持有日志文件路径和提交计数
/// - 串行化并发写入（多个运行共享同一个实例）
/// - 写入失败只打 warn，不影响流程
pub struct EventLog {
    path: Option<PathBuf>,
    tally: Mutex<SubmissionTally>,
}

impl EventLog {
    /// 写入指定文件（目录不存在时自动创建）
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            tally: Mutex::new(SubmissionTally::default()),
        }
    }

    /// 不落盘的事件日志，只保留计数
    pub fn discard() -> Self {
        Self {
            path: None,
            tally: Mutex::new(SubmissionTally::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 当前累计
    pub fn tally(&self) -> SubmissionTally {
        self.tally.lock().map(|t| *t).unwrap_or_default()
    }

    /// 写入一条事件
    ///
    /// 名为 `secret` 的字段一律写成 `***`，其余字段值中出现的 `secret` 替换为 `***`
    pub fn record(&self, event_type: &str, secret: &str, fields: &[(&str, String)]) {
        let block = format_record(event_type, &chrono::Utc::now(), secret, fields);

        // 同一把锁同时保护计数和文件写入，保证记录不会交错
        let _guard = match self.tally.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.append(&block);
    }

    /// 记录提交结果并返回更新后的累计
    pub fn record_submission(
        &self,
        correct: bool,
        secret: &str,
        fields: &[(&str, String)],
    ) -> SubmissionTally {
        let mut guard = match self.tally.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if correct {
            guard.correct += 1;
        } else {
            guard.incorrect += 1;
        }
        let tally = *guard;

        let mut all_fields: Vec<(&str, String)> = fields.to_vec();
        all_fields.push(("correct", correct.to_string()));
        all_fields.push(("total_correct", tally.correct.to_string()));
        all_fields.push(("total_incorrect", tally.incorrect.to_string()));

        let block = format_record("SUBMISSION_RESULT", &chrono::Utc::now(), secret, &all_fields);
        self.append(&block);

        tally
    }

    fn append(&self, block: &str) {
        let Some(path) = &self.path else {
            return;
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent) {
                    warn!("无法创建日志目录 {}: {}", parent.display(), e);
                    return;
                }
            }
        }

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(block.as_bytes()));

        if let Err(e) = result {
            warn!("写入事件日志失败 {}: {}", path.display(), e);
        }
    }
}

fn format_record(
    event_type: &str,
    timestamp: &chrono::DateTime<chrono::Utc>,
    secret: &str,
    fields: &[(&str, String)],
) -> String {
    let mut lines = vec![
        format!("Event type: {}", event_type),
        format!("({})", timestamp.format("%Y-%m-%dT%H:%M:%S%.6fZ")),
    ];
    for (key, value) in fields {
        if key.eq_ignore_ascii_case("secret") {
            lines.push(format!("{}: ***", key));
        } else {
            lines.push(format!("{}: {}", key, redact(value, secret)));
        }
    }
    lines.push("-----".to_string());
    lines.join("\n") + "\n"
}
