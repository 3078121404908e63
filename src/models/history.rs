//! 当前题目的错误历史
//!
//! 只记录错误上下文，供下一次生成代码时参考。
//! 答对并跳转到新题目时清空；同一题目的重试之间保留。

use serde::Serialize;

/// 历史记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    /// 提交被判错、转写失败或步骤超时
    Error,
    /// 生成的代码以非零状态退出
    ExecutionFailure,
}

/// 单条历史记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub kind: RecordKind,
    pub message: String,
    /// 尝试序号（从 1 开始；0 表示在第一次尝试之前，例如转写失败）
    pub attempt: usize,
}

/// 错误历史
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct History {
    records: Vec<HistoryRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: RecordKind, message: impl Into<String>, attempt: usize) {
        self.records.push(HistoryRecord {
            kind,
            message: message.into(),
            attempt,
        });
    }

    pub fn push_error(&mut self, message: impl Into<String>, attempt: usize) {
        self.push(RecordKind::Error, message, attempt);
    }

    pub fn push_execution_failure(&mut self, message: impl Into<String>, attempt: usize) {
        self.push(RecordKind::ExecutionFailure, message, attempt);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 序列化为提示词中使用的 JSON
    pub fn to_prompt_json(&self) -> String {
        if self.records.is_empty() {
            return "[]".to_string();
        }
        serde_json::to_string_pretty(&self.records).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_clear() {
        let mut history = History::new();
        assert!(history.is_empty());

        history.push_error("Incorrect answer", 1);
        history.push_execution_failure("Traceback ...", 2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.records()[0].kind, RecordKind::Error);
        assert_eq!(history.records()[1].attempt, 2);

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_prompt_json_uses_kebab_case_kinds() {
        let mut history = History::new();
        assert_eq!(history.to_prompt_json(), "[]");

        history.push_execution_failure("boom", 1);
        let json: serde_json::Value = serde_json::from_str(&history.to_prompt_json()).unwrap();
        assert_eq!(json[0]["kind"], "execution-failure");
        assert_eq!(json[0]["message"], "boom");
        assert_eq!(json[0]["attempt"], 1);
    }
}
