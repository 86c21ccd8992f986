//! 应用状态

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::EnvConfig;

use super::log_hub::LogHub;
use super::task_store::TaskStore;

/// 全局 shutdown token，用于优雅关闭所有后台任务
static GLOBAL_SHUTDOWN: std::sync::OnceLock<CancellationToken> = std::sync::OnceLock::new();

/// 获取全局 shutdown token
pub fn get_shutdown_token() -> CancellationToken {
    GLOBAL_SHUTDOWN.get_or_init(CancellationToken::new).clone()
}

/// 触发全局 shutdown
pub fn trigger_shutdown() {
    if let Some(token) = GLOBAL_SHUTDOWN.get() {
        token.cancel();
    }
}

/// 应用状态
pub struct AppState {
    /// API 密钥（用于验证请求）
    pub api_key: String,
    /// 环境配置
    pub config: EnvConfig,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,
    /// 任务存储
    pub task_store: TaskStore,
    /// 日志中心
    pub log_hub: LogHub,
    /// 运行中部署的取消令牌 (task_id -> token)
    running_deploys: RwLock<HashMap<String, CancellationToken>>,
}

impl AppState {
    pub fn new(config: EnvConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            config,
            started_at: Utc::now(),
            task_store: TaskStore::new(),
            log_hub: LogHub::new(),
            running_deploys: RwLock::new(HashMap::new()),
        }
    }

    /// 注册运行中的部署，返回其取消令牌
    pub async fn register_running_deploy(&self, task_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.running_deploys
            .write()
            .await
            .insert(task_id.to_string(), token.clone());
        token
    }

    /// 取消注册
    pub async fn unregister_running_deploy(&self, task_id: &str) {
        self.running_deploys.write().await.remove(task_id);
    }

    /// 取消一个运行中的部署
    ///
    /// 返回 false 表示没有对应的运行中任务
    pub async fn cancel_deploy(&self, task_id: &str) -> bool {
        let deploys = self.running_deploys.read().await;
        match deploys.get(task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState::new(EnvConfig {
            api_key: "test-key".to_string(),
            port: 0,
        })
    }

    #[tokio::test]
    async fn test_register_and_cancel() {
        let state = test_state();
        let token = state.register_running_deploy("t-1").await;
        assert!(!token.is_cancelled());

        assert!(state.cancel_deploy("t-1").await);
        assert!(token.is_cancelled());

        assert!(!state.cancel_deploy("unknown").await);
    }

    #[tokio::test]
    async fn test_unregister() {
        let state = test_state();
        state.register_running_deploy("t-1").await;
        state.unregister_running_deploy("t-1").await;
        assert!(!state.cancel_deploy("t-1").await);
    }
}
