//! 时间预算模型
//!
//! 两级截止时间：全局截止时间限制整次运行，单题截止时间限制每道题。
//! 全局时间用尽后，如果还有一个见过的下一题地址，允许用兜底预算再做一次。

use std::time::Duration;

use tokio::time::Instant;

use crate::config::Config;

/// 每轮开始时的运行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// 全局时间未用尽
    Active,
    /// 全局时间已用尽，正在处理兜底题目
    FallbackPending,
    /// 结束（超时）
    Done,
}

/// 外层循环的状态，只由编排层修改，不在运行之间共享
#[derive(Debug, Clone)]
pub struct LoopState {
    pub current_url: String,
    pub global_deadline: Instant,
    /// 整次运行中最近一次见到的下一题地址
    pub last_suggested_next: Option<String>,
    /// 兜底机会是否已用掉
    pub fallback_used: bool,
}

impl LoopState {
    pub fn new(start_url: impl Into<String>, global_deadline: Instant) -> Self {
        Self {
            current_url: start_url.into(),
            global_deadline,
            last_suggested_next: None,
            fallback_used: false,
        }
    }

    /// 记录见到的下一题地址（以最近一次为准）
    pub fn remember_next(&mut self, url: &str) {
        self.last_suggested_next = Some(url.to_string());
    }
}

/// 计算本轮所处阶段
///
/// 进入 `FallbackPending` 时会把当前地址切换到最近见到的下一题，并标记兜底已用
pub fn next_phase(now: Instant, state: &mut LoopState) -> RunPhase {
    if now < state.global_deadline {
        return RunPhase::Active;
    }

    if !state.fallback_used {
        if let Some(next) = state.last_suggested_next.clone() {
            state.current_url = next;
            state.fallback_used = true;
            return RunPhase::FallbackPending;
        }
    }

    RunPhase::Done
}

/// 一次运行的各项限制
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub run_budget: Duration,
    pub question_budget: Duration,
    pub fallback_budget: Duration,
    pub max_attempts: usize,
    pub max_visual_images: usize,
}

impl RunLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            run_budget: config.run_budget(),
            question_budget: config.question_budget(),
            fallback_budget: config.fallback_budget(),
            max_attempts: config.max_attempts,
            max_visual_images: config.max_visual_images,
        }
    }

    /// 单题截止时间
    ///
    /// - `Active`：min(全局截止时间, 本轮开始 + 单题预算)
    /// - `FallbackPending`：本轮开始 + 兜底预算
    pub fn question_deadline(&self, phase: RunPhase, started: Instant, global_deadline: Instant) -> Instant {
        match phase {
            RunPhase::FallbackPending => started + self.fallback_budget,
            _ => global_deadline.min(started + self.question_budget),
        }
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_active_before_deadline() {
        let now = Instant::now();
        let mut state = LoopState::new("https://q/1", now + Duration::from_secs(10));
        state.remember_next("https://q/2");

        assert_eq!(next_phase(now, &mut state), RunPhase::Active);
        assert_eq!(state.current_url, "https://q/1");
        assert!(!state.fallback_used);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_is_used_once() {
        let now = Instant::now();
        let mut state = LoopState::new("https://q/1", now);
        state.remember_next("https://q/2");

        assert_eq!(next_phase(now, &mut state), RunPhase::FallbackPending);
        assert_eq!(state.current_url, "https://q/2");
        assert!(state.fallback_used);

        state.remember_next("https://q/3");
        assert_eq!(next_phase(now, &mut state), RunPhase::Done);
        assert_eq!(state.current_url, "https://q/2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_without_suggestion() {
        let now = Instant::now();
        let mut state = LoopState::new("https://q/1", now - Duration::from_secs(1));
        assert_eq!(next_phase(now, &mut state), RunPhase::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_deadline() {
        let limits = RunLimits {
            run_budget: Duration::from_secs(170),
            question_budget: Duration::from_secs(90),
            fallback_budget: Duration::from_secs(60),
            max_attempts: 3,
            max_visual_images: 3,
        };
        let start = Instant::now();
        let global = start + Duration::from_secs(170);

        assert_eq!(
            limits.question_deadline(RunPhase::Active, start, global),
            start + Duration::from_secs(90)
        );
        let late = start + Duration::from_secs(150);
        assert_eq!(limits.question_deadline(RunPhase::Active, late, global), global);
        let after = start + Duration::from_secs(175);
        assert_eq!(
            limits.question_deadline(RunPhase::FallbackPending, after, global),
            after + Duration::from_secs(60)
        );
    }

    #[test]
    fn test_limits_from_default_config() {
        let limits = RunLimits::default();
        assert_eq!(limits.run_budget, Duration::from_secs(170));
        assert_eq!(limits.max_attempts, 3);
    }
}
