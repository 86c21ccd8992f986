//! 环境变量配置加载

use std::env;
use tracing::warn;

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// API 密钥
    pub api_key: String,
    /// 服务监听端口
    pub port: u16,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        // API Key - 支持旧名称兼容
        let api_key = load_with_fallback("DEPLOY_AGENT_API_KEY", "API_KEY")
            .unwrap_or_else(|| "change-me-in-production".to_string());
        if env::var("API_KEY").is_ok() {
            warn!("Deprecated environment variable API_KEY detected. Please use DEPLOY_AGENT_API_KEY");
        }

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3001);

        Self { api_key, port }
    }
}

/// 加载环境变量，支持 fallback
fn load_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary).ok().or_else(|| env::var(fallback).ok())
}

/// 常量
pub mod constants {
    /// SSH 连接超时（秒）
    pub const CONNECT_TIMEOUT_SECS: u64 = 30;

    /// 最大活跃任务数
    pub const MAX_ACTIVE_TASKS: usize = 50;

    /// 已完成任务的保留时间（小时），过期后从内存移除
    pub const TASK_RETENTION_HOURS: i64 = 24;

    /// 后台清理周期（秒）
    pub const CLEANUP_INTERVAL_SECS: u64 = 300;

    /// 部署验收时抓取的进程日志行数
    pub const PM2_LOG_LINES: u32 = 50;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_with_fallback() {
        env::set_var("TEST_PRIMARY", "primary_value");
        env::set_var("TEST_FALLBACK", "fallback_value");

        assert_eq!(
            load_with_fallback("TEST_PRIMARY", "TEST_FALLBACK"),
            Some("primary_value".to_string())
        );

        env::remove_var("TEST_PRIMARY");
        assert_eq!(
            load_with_fallback("TEST_PRIMARY", "TEST_FALLBACK"),
            Some("fallback_value".to_string())
        );

        env::remove_var("TEST_FALLBACK");
        assert_eq!(load_with_fallback("TEST_PRIMARY", "TEST_FALLBACK"), None);
    }
}
