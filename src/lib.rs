//! XJP SSH Deploy - 远程 SSH 部署服务
//!
//! 通过一条 SSH 会话把 Node.js 应用部署到远程 Linux 主机，
//! 部署进度以结构化日志事件实时推送（SSE）

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod middleware;
pub mod services;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::env::constants::{CLEANUP_INTERVAL_SECS, TASK_RETENTION_HOURS};
pub use config::RuntimeConfig;
use state::{get_shutdown_token, AppState};

/// 初始化并运行服务
pub async fn init_and_run(runtime: RuntimeConfig) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = config::EnvConfig::from_env();
    if let Some(port) = runtime.port_override {
        config.port = port;
    }

    let state = Arc::new(AppState::new(config));

    spawn_cleanup_task(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    info!(addr = %addr, version = config::env::constants::VERSION, "Starting xjp-ssh-deploy");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// 周期清理过期任务与日志通道
fn spawn_cleanup_task(state: Arc<AppState>) {
    let shutdown = get_shutdown_token();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    state.task_store.cleanup_expired().await;
                    state.log_hub.cleanup().await;
                    state.log_hub.cleanup_expired(TASK_RETENTION_HOURS).await;
                }
            }
        }
    });
}

/// 等待 Ctrl-C 或全局 shutdown
async fn shutdown_signal() {
    let shutdown = get_shutdown_token();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            state::trigger_shutdown();
        }
        _ = shutdown.cancelled() => {}
    }
}
