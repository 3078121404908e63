//! HTTP 入口 - 编排层
//!
//! - `POST /run`：校验密钥后在后台启动一次运行，立即返回 queued
//! - `GET /health`：存活检查
//!
//! 运行结果只写入日志，不会返回给调用方

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::QuizRun;
use crate::orchestrator::quiz_runner::QuizRunner;
use crate::utils::short_id;

/// 路由共享状态（只读）
pub struct AppState {
    pub config: Arc<Config>,
    pub runner: Arc<QuizRunner>,
}

/// `POST /run` 请求体
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub email: String,
    pub secret: String,
    pub url: String,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/run", post(start_run))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn start_run(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) if !request.url.trim().is_empty() => request,
        Ok(_) => return detail(StatusCode::BAD_REQUEST, "Invalid JSON or request body"),
        Err(rejection) => {
            warn!("⚠️ 请求体无效: {}", rejection.body_text());
            return detail(StatusCode::BAD_REQUEST, "Invalid JSON or request body");
        }
    };

    if request.secret != state.config.student_secret {
        warn!("🔒 密钥不匹配，拒绝请求 ({})", request.email);
        return detail(StatusCode::FORBIDDEN, "Invalid secret");
    }

    let run = QuizRun::new(
        request.url.trim(),
        request.email,
        request.secret,
        state.runner.limits().run_budget,
    );
    let run_id = run.run_id;
    info!("[run {}] 📥 已接受: {}", short_id(&run_id), run.start_url);

    let runner = state.runner.clone();
    tokio::spawn(async move {
        execute_run(runner, run).await;
    });

    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "detail": "queued", "run_id": run_id.to_string() })),
    )
        .into_response()
}

/// 后台执行一次运行，并把结果写入事件日志
pub async fn execute_run(runner: Arc<QuizRunner>, run: QuizRun) {
    let run_tag = short_id(&run.run_id);
    let events = runner.events().clone();

    events.record(
        "RUN_STARTED",
        &run.secret,
        &[
            ("run_id", run.run_id.to_string()),
            ("email", run.email.clone()),
            ("url", run.start_url.clone()),
        ],
    );

    match runner.run(&run).await {
        Ok(report) => {
            events.record(
                "RUN_FINISHED",
                &run.secret,
                &[
                    ("run_id", run.run_id.to_string()),
                    ("outcome", report.outcome.to_string()),
                    ("questions", report.visited_urls.len().to_string()),
                    ("submissions", report.submissions().to_string()),
                    ("elapsed_seconds", format!("{:.1}", report.elapsed.as_secs_f64())),
                ],
            );
        }
        Err(e) => {
            error!("[run {}] ❌ 运行失败: {:#}", run_tag, e);
            events.record(
                "RUN_ERROR",
                &run.secret,
                &[
                    ("run_id", run.run_id.to_string()),
                    ("error", "internal error".to_string()),
                ],
            );
        }
    }
}
