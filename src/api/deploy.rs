//! 部署管理 API
//!
//! 包含 /deploy, /tasks/*, /logs/* 端点

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Serialize;
use std::{convert::Infallible, sync::Arc};
use tokio::sync::broadcast;
use tracing::warn;

use crate::domain::deploy::{DeployRequest, DeployTask};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequireApiKey;
use crate::services;
use crate::state::AppState;

/// 触发部署响应
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub task_id: String,
    pub status: String,
    pub stream_url: String,
}

/// 取消部署响应
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub task_id: String,
    pub status: String,
}

/// 创建部署管理路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deploy", post(trigger_deploy))
        .route("/tasks/:task_id", get(get_task_status))
        .route("/tasks/:task_id/cancel", post(cancel_deploy))
        .route("/logs/:task_id/stream", get(stream_logs))
}

/// 触发部署
///
/// POST /deploy
/// 需要 API Key
///
/// 校验请求后立即返回任务 ID，部署在后台执行，
/// 进度通过 /logs/:task_id/stream 订阅
async fn trigger_deploy(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Json(request): Json<DeployRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_request(&request)?;

    let task_id = uuid::Uuid::new_v4().to_string();
    let task = DeployTask::new(
        task_id.clone(),
        request.app_name.clone(),
        request.host.clone(),
    );
    if !state.task_store.create(task).await {
        return Err(ApiError::internal("Too many active deployments"));
    }

    // 日志通道先建好，订阅晚于事件也只会丢开头不报 404
    state.log_hub.create(&task_id).await;

    let response = TriggerResponse {
        task_id: task_id.clone(),
        status: "running".to_string(),
        stream_url: format!("/logs/{}/stream", task_id),
    };

    // 在后台执行部署（非阻塞）
    tokio::spawn(services::deploy::execute(state.clone(), task_id, request));

    Ok(Json(response))
}

/// 请求必填字段校验
fn validate_request(request: &DeployRequest) -> Result<(), ApiError> {
    let required = [
        ("host", &request.host),
        ("username", &request.username),
        ("privateKey", &request.private_key),
        ("repoUrl", &request.repo_url),
        ("appName", &request.app_name),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(ApiError::bad_request(format!("Missing field: {}", name)));
        }
    }
    Ok(())
}

/// 获取任务状态
///
/// GET /tasks/:task_id
/// 无需认证
async fn get_task_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let task = state
        .task_store
        .get(&task_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Task '{}'", task_id)))?;

    Ok(Json(task))
}

/// 取消运行中的部署
///
/// POST /tasks/:task_id/cancel
/// 需要 API Key
async fn cancel_deploy(
    _auth: RequireApiKey,
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !state.cancel_deploy(&task_id).await {
        return Err(ApiError::not_found(format!("Running task '{}'", task_id)));
    }

    Ok(Json(CancelResponse {
        task_id,
        status: "cancelling".to_string(),
    }))
}

/// 流式日志
///
/// GET /logs/:task_id/stream
/// 无需认证
///
/// 每条日志事件一个 data 帧，部署结束后追加 complete 事件
async fn stream_logs(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let mut rx = state
        .log_hub
        .subscribe(&task_id)
        .await
        .ok_or_else(|| {
            ApiError::not_found(format!("Task '{}' not found or already completed", task_id))
        })?;

    let state_clone = state.clone();
    let task_id_clone = task_id.clone();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().data(json));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(task_id = %task_id_clone, lagged = n, "Log subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    // 发送结束事件
                    if let Some(task) = state_clone.task_store.get(&task_id_clone).await {
                        yield Ok(Event::default().event("complete").data(
                            serde_json::json!({
                                "status": task.status.as_str(),
                                "error": task.error,
                            })
                            .to_string(),
                        ));
                    }
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keepalive"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(host: &str) -> DeployRequest {
        serde_json::from_value(serde_json::json!({
            "host": host,
            "username": "root",
            "privateKey": "key",
            "repoUrl": "https://github.com/org/app.git",
            "appName": "app",
        }))
        .unwrap()
    }

    #[test]
    fn test_validate_request() {
        assert!(validate_request(&request_with("1.2.3.4")).is_ok());
        assert!(validate_request(&request_with("  ")).is_err());
    }
}
