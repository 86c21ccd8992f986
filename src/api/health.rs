//! 健康检查 API

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::config::env::constants::VERSION;
use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    uptime_secs: i64,
    active_deploys: usize,
}

/// 创建健康检查路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// GET /health
/// 无需认证
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = Utc::now();
    Json(HealthResponse {
        status: "ok",
        service: "xjp-ssh-deploy",
        version: VERSION,
        timestamp: now.to_rfc3339(),
        uptime_secs: (now - state.started_at).num_seconds(),
        active_deploys: state.task_store.running_count().await,
    })
}
