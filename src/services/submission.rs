//! 答案提交服务 - 业务能力层
//!
//! 负责从页面文本中找出提交地址，并把答案 POST 过去

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::error::SubmissionError;
use crate::infrastructure::EventLog;
use crate::models::SubmissionOutcome;
use crate::services::{Submission, Submitter};

/// 关键词前后多少个字符内的地址参与排序
const PROXIMITY_WINDOW: usize = 120;

const SUBMIT_PHRASES: &[&str] = &["post your answer", "submit"];

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

/// 候选提交地址
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    url: String,
    /// 在文本中首次出现的字节区间
    start: usize,
    end: usize,
}

/// 从页面文本中找出提交地址
///
/// 候选包括绝对 URL 和以 `/` 开头的路径（按页面 URL 解析），
/// 页面自身的 URL 不算候选。距离 "submit" / "post your answer" 最近的候选胜出，
/// 距离相同取先出现的；关键词附近没有候选时取第一个候选。
pub fn locate_endpoint(page_text: &str, page_url: &str) -> Option<String> {
    let candidates = match collect_candidates(page_text, page_url) {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!("扫描提交地址失败: {}", e);
            return None;
        }
    };
    if candidates.is_empty() {
        return None;
    }

    // ASCII 小写保证下标与原文一致
    let lower = page_text.to_ascii_lowercase();
    let keyword_spans: Vec<(usize, usize)> = SUBMIT_PHRASES
        .iter()
        .flat_map(|phrase| {
            lower
                .match_indices(phrase)
                .map(|(idx, m)| char_span(page_text, idx, idx + m.len()))
                .collect::<Vec<_>>()
        })
        .collect();

    let ranked = candidates
        .iter()
        .enumerate()
        .filter_map(|(order, candidate)| {
            let (start, end) = char_span(page_text, candidate.start, candidate.end);
            keyword_spans
                .iter()
                .map(|&(kw_start, kw_end)| span_distance(start, end, kw_start, kw_end))
                .min()
                .filter(|&distance| distance <= PROXIMITY_WINDOW)
                .map(|distance| (distance, order))
        })
        .min();

    let chosen = match ranked {
        Some((_, order)) => &candidates[order],
        None => &candidates[0],
    };
    Some(chosen.url.clone())
}

/// 字节区间换算成字符区间
fn char_span(text: &str, start: usize, end: usize) -> (usize, usize) {
    let start_chars = text[..start].chars().count();
    (start_chars, start_chars + text[start..end].chars().count())
}

/// 两个区间之间的字符距离，重叠时为 0
fn span_distance(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> usize {
    if a_end <= b_start {
        b_start - a_end
    } else if b_end <= a_start {
        a_start - b_end
    } else {
        0
    }
}

fn collect_candidates(page_text: &str, page_url: &str) -> Result<Vec<Candidate>> {
    let base = Url::parse(page_url.trim()).ok();
    let own = normalize(page_url);

    let absolute_re = Regex::new(r#"https?://[^\s"'<>]+"#)?;
    // 只匹配独立出现的路径，避免把 "and/or" 或 URL 内部的路径当成候选
    let path_re = Regex::new(r#"(?:^|[\s"'(\[<=])(/[^\s"'<>]+)"#)?;

    let mut found: Vec<Candidate> = Vec::new();
    let mut push = |url: String, start: usize, end: usize| {
        if normalize(&url) == own || found.iter().any(|c| c.url == url) {
            return;
        }
        found.push(Candidate { url, start, end });
    };

    for m in absolute_re.find_iter(page_text) {
        let raw = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        if raw.is_empty() {
            continue;
        }
        push(raw.to_string(), m.start(), m.start() + raw.len());
    }

    // 路径必须能按页面 URL 解析
    if let Some(base) = &base {
        for cap in path_re.captures_iter(page_text) {
            let Some(m) = cap.get(1) else { continue };
            let raw = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            if raw.len() < 2 || raw.starts_with("//") {
                continue;
            }
            if let Ok(resolved) = base.join(raw) {
                push(resolved.to_string(), m.start(), m.start() + raw.len());
            }
        }
    }

    // 绝对 URL 与路径混合后按出现顺序排列
    found.sort_by_key(|c| c.start);
    Ok(found)
}

fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

/// 答案提交服务
///
/// 职责：
/// - 找出提交地址并发送 `{email, secret, url, answer}`
/// - 所有失败都转换为带原因的"回答错误"结果
/// - 日志中的 secret 一律脱敏
pub struct SubmissionService {
    client: reqwest::Client,
    events: Arc<EventLog>,
}

impl SubmissionService {
    pub fn new(request_timeout: Duration, events: Arc<EventLog>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, events })
    }

    async fn post_answer(
        &self,
        submit_url: &str,
        submission: &Submission<'_>,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let payload = json!({
            "email": submission.email,
            "secret": submission.secret,
            "url": submission.page_url,
            "answer": submission.answer,
        });
        let safe_payload = masked_payload(&payload);

        let response = match self.client.post(submit_url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                self.events.record(
                    "SENT_POST",
                    submission.secret,
                    &[
                        ("submit_url", submit_url.to_string()),
                        ("status_code", "network_error".to_string()),
                        ("payload", safe_payload),
                        ("error", e.to_string()),
                    ],
                );
                return Err(SubmissionError::RequestFailed {
                    message: e.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let parsed: Result<JsonValue, _> = serde_json::from_str(&body);

        self.events.record(
            "SENT_POST",
            submission.secret,
            &[
                ("submit_url", submit_url.to_string()),
                ("status_code", status.to_string()),
                ("payload", safe_payload),
            ],
        );

        let data = parsed.map_err(|e| SubmissionError::InvalidResponse {
            status,
            message: e.to_string(),
        })?;

        debug!("提交响应 ({}): {}", status, data);
        Ok(parse_reply(&data))
    }
}

/// 解析评测服务的返回：`correct`、`url`（下一题）、`reason`
pub fn parse_reply(data: &JsonValue) -> SubmissionOutcome {
    let correct = data.get("correct").and_then(|v| v.as_bool()).unwrap_or(false);
    let next_url = data
        .get("url")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let reason = match data.get("reason") {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };

    SubmissionOutcome {
        correct,
        next_url,
        reason,
    }
}

fn masked_payload(payload: &JsonValue) -> String {
    let mut safe = payload.clone();
    if safe.get("secret").is_some() {
        safe["secret"] = json!("***");
    }
    safe.to_string()
}

#[async_trait]
impl Submitter for SubmissionService {
    async fn submit(&self, submission: Submission<'_>) -> SubmissionOutcome {
        let Some(submit_url) = locate_endpoint(submission.page_text, submission.page_url) else {
            warn!("页面中找不到提交地址: {}", submission.page_url);
            return SubmissionOutcome::soft_failure(SubmissionError::EndpointNotFound.to_string());
        };

        debug!("提交答案到: {}", submit_url);
        match self.post_answer(&submit_url, &submission).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("提交失败: {}", e);
                SubmissionOutcome::soft_failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proximity_beats_discovery_order() {
        let text = "Answer: visit https://x/foo then https://x/submit to post your answer";
        assert_eq!(locate_endpoint(text, "https://x/foo").as_deref(), Some("https://x/submit"));
    }

    #[test]
    fn test_nearest_candidate_wins_inside_window() {
        let text = "Data: https://x/data.csv is attached to this page for you to read. \
                    Post your answer to https://x/answers.";
        assert_eq!(
            locate_endpoint(text, "https://x/quiz-1").as_deref(),
            Some("https://x/answers")
        );
    }

    #[test]
    fn test_only_own_url_returns_none() {
        let text = "You are on https://x/quiz-834. Submit wisely.";
        assert_eq!(locate_endpoint(text, "https://x/quiz-834"), None);
        assert_eq!(locate_endpoint(text, "HTTPS://X/quiz-834/"), None);
    }

    #[test]
    fn test_no_urls_returns_none() {
        assert_eq!(locate_endpoint("Submit the sum of the column.", "https://x/q"), None);
        assert_eq!(locate_endpoint("", "https://x/q"), None);
    }

    #[test]
    fn test_equal_distance_ties_break_by_first_occurrence() {
        let text = "https://x/a submit https://x/b";
        assert_eq!(locate_endpoint(text, "https://x/q").as_deref(), Some("https://x/a"));
    }

    #[test]
    fn test_falls_back_to_first_candidate_without_keywords() {
        let text = "Read https://x/one and then https://x/two.";
        assert_eq!(locate_endpoint(text, "https://x/q").as_deref(), Some("https://x/one"));
    }

    #[test]
    fn test_far_away_keyword_does_not_rank() {
        let filler = "lorem ipsum ".repeat(20);
        let text = format!("See https://x/first. {} Later, https://x/second. {} submit", filler, filler);
        assert_eq!(locate_endpoint(&text, "https://x/q").as_deref(), Some("https://x/first"));
    }

    #[test]
    fn test_window_counts_characters_not_bytes() {
        // 100 个汉字占 300 字节，但只算 100 个字符
        let text = format!(
            "Data: https://x/data.csv{}Submit: {} https://x/answers",
            " ".repeat(150),
            "中".repeat(100)
        );
        assert_eq!(locate_endpoint(&text, "https://x/q").as_deref(), Some("https://x/answers"));
    }

    #[test]
    fn test_relative_path_resolves_against_page() {
        let text = "POST your answer as JSON to /submit with the fields below.";
        assert_eq!(
            locate_endpoint(text, "https://quiz.example/demo/q1").as_deref(),
            Some("https://quiz.example/submit")
        );
    }

    #[test]
    fn test_inline_slashes_are_not_paths() {
        let text = "Use the mean and/or median. Post your answer to https://x/submit.";
        assert_eq!(locate_endpoint(text, "https://x/q").as_deref(), Some("https://x/submit"));
    }

    #[test]
    fn test_trailing_punctuation_is_stripped() {
        let text = "Submit to (https://x/submit).";
        assert_eq!(locate_endpoint(text, "https://x/q").as_deref(), Some("https://x/submit"));
    }

    #[test]
    fn test_parse_reply() {
        let reply = parse_reply(&json!({"correct": true, "url": "https://x/q2", "reason": null}));
        assert!(reply.correct);
        assert_eq!(reply.next_url.as_deref(), Some("https://x/q2"));
        assert_eq!(reply.reason, None);

        let reply = parse_reply(&json!({"correct": false, "reason": {"code": 7}}));
        assert!(!reply.correct);
        assert_eq!(reply.next_url, None);
        assert_eq!(reply.reason.as_deref(), Some(r#"{"code":7}"#));

        let reply = parse_reply(&json!({"url": ""}));
        assert!(!reply.correct);
        assert_eq!(reply.next_url, None);
    }

    #[test]
    fn test_masked_payload() {
        let payload = json!({"email": "a@b.c", "secret": "hunter2", "answer": "4"});
        let masked = masked_payload(&payload);
        assert!(!masked.contains("hunter2"));
        assert!(masked.contains("***"));
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_soft_failure() {
        let service =
            SubmissionService::new(Duration::from_secs(1), Arc::new(EventLog::discard())).unwrap();
        let outcome = service
            .submit(Submission {
                page_text: "no links at all",
                page_url: "https://x/q",
                email: "a@b.c",
                secret: "hunter2",
                answer: "4",
            })
            .await;
        assert!(!outcome.correct);
        assert_eq!(
            outcome.reason.as_deref(),
            Some("Could not identify submission endpoint from page text.")
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_soft_failure() {
        let service =
            SubmissionService::new(Duration::from_secs(2), Arc::new(EventLog::discard())).unwrap();
        let outcome = service
            .submit(Submission {
                page_text: "Post your answer to http://127.0.0.1:9/submit",
                page_url: "http://127.0.0.1:9/q",
                email: "a@b.c",
                secret: "hunter2",
                answer: "4",
            })
            .await;
        assert!(!outcome.correct);
        assert!(outcome.reason.unwrap().starts_with("Error submitting answer"));
    }
}
