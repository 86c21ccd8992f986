//! 统一错误处理
//!
//! `DeployError` 覆盖部署管道的致命错误；`ApiError` 实现 `IntoResponse`，
//! 替代重复的 `(StatusCode, Json<ErrorResponse>)` 模式

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// 部署管道的致命错误
///
/// 命令退出码非 0 不属于错误：它以 warning 级日志事件上报，由各步骤
/// 自行决定是否中止（目前只有 nginx 配置校验会中止）。
#[derive(Debug, Error)]
pub enum DeployError {
    /// 会话从未到达 Connected 状态（密钥无效、网络不通、认证被拒、超时）
    #[error("SSH connection failed: {0}")]
    Connection(String),

    /// 命令执行期间传输层失败（会话断开、通道 I/O 错误）
    #[error("command execution failed: {0}")]
    CommandExecution(String),

    /// nginx 配置校验未通过，拒绝 reload
    #[error("nginx configuration test failed with exit code {0}; reload aborted")]
    ProxyConfigRejected(i32),
}

/// API 错误响应结构
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// 统一 API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 401 - 未授权（API Key 无效或缺失）
    Unauthorized,
    /// 404 - 资源未找到
    NotFound(String),
    /// 400 - 请求无效
    BadRequest(String),
    /// 500 - 内部错误
    Internal(String),
}

impl ApiError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Invalid or missing API key".to_string(),
            ),
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} not found", resource),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorResponse::new(error_type, message);
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::NotFound(r) => write!(f, "Not found: {}", r),
            ApiError::BadRequest(m) => write!(f, "Bad request: {}", m),
            ApiError::Internal(m) => write!(f, "Internal error: {}", m),
        }
    }
}

impl std::error::Error for ApiError {}

/// 便捷类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_new() {
        let resp = ErrorResponse::new("test_error", "Test message");
        assert_eq!(resp.error, "test_error");
        assert_eq!(resp.message, "Test message");
    }

    #[test]
    fn test_deploy_error_display() {
        let err = DeployError::Connection("auth rejected".to_string());
        assert_eq!(err.to_string(), "SSH connection failed: auth rejected");

        let err = DeployError::ProxyConfigRejected(1);
        assert!(err.to_string().contains("exit code 1"));
    }
}
