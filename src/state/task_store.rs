//! 任务存储
//!
//! 内存中的活跃任务注册表。已完成的任务保留一个窗口期供状态查询，
//! 过期即清理，不做持久化历史

use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::config::env::constants::{MAX_ACTIVE_TASKS, TASK_RETENTION_HOURS};
use crate::domain::deploy::{DeployStatus, DeployTask};

/// 任务存储
pub struct TaskStore {
    tasks: RwLock<HashMap<String, DeployTask>>,
    /// 最大任务数（含保留期内的已完成任务）
    max_tasks: usize,
    /// 已完成任务的保留时间
    retention: Duration,
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            max_tasks: MAX_ACTIVE_TASKS,
            retention: Duration::hours(TASK_RETENTION_HOURS),
        }
    }

    /// 使用自定义配置创建
    pub fn with_config(max_tasks: usize, retention_hours: i64) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            max_tasks,
            retention: Duration::hours(retention_hours),
        }
    }

    /// 注册新任务
    ///
    /// 返回 false 表示任务表已满，请求应被拒绝
    pub async fn create(&self, task: DeployTask) -> bool {
        let mut tasks = self.tasks.write().await;
        if tasks.len() >= self.max_tasks {
            return false;
        }
        tasks.insert(task.id.clone(), task);
        true
    }

    /// 获取任务
    pub async fn get(&self, task_id: &str) -> Option<DeployTask> {
        let tasks = self.tasks.read().await;
        tasks.get(task_id).cloned()
    }

    /// 标记任务完成
    pub async fn finish(&self, task_id: &str, status: DeployStatus, error: Option<String>) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(task_id) {
            task.complete(status, error);
        }
    }

    /// 运行中的任务数
    pub async fn running_count(&self) -> usize {
        let tasks = self.tasks.read().await;
        tasks
            .values()
            .filter(|t| t.status == DeployStatus::Running)
            .count()
    }

    /// 清理保留期已过的已完成任务
    pub async fn cleanup_expired(&self) {
        let now = Utc::now();
        let mut tasks = self.tasks.write().await;
        tasks.retain(|_, task| match task.finished_at {
            Some(finished) => now - finished < self.retention,
            None => true,
        });
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str) -> DeployTask {
        DeployTask::new(id.to_string(), "my-app".to_string(), "1.2.3.4".to_string())
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = TaskStore::new();
        assert!(store.create(task("t-1")).await);

        let loaded = store.get("t-1").await.unwrap();
        assert_eq!(loaded.app_name, "my-app");
        assert_eq!(loaded.status, DeployStatus::Running);
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_when_full() {
        let store = TaskStore::with_config(1, 24);
        assert!(store.create(task("t-1")).await);
        assert!(!store.create(task("t-2")).await);
    }

    #[tokio::test]
    async fn test_finish_and_running_count() {
        let store = TaskStore::new();
        store.create(task("t-1")).await;
        store.create(task("t-2")).await;
        assert_eq!(store.running_count().await, 2);

        store
            .finish("t-1", DeployStatus::Failed, Some("boom".to_string()))
            .await;
        assert_eq!(store.running_count().await, 1);

        let finished = store.get("t-1").await.unwrap();
        assert_eq!(finished.status, DeployStatus::Failed);
        assert_eq!(finished.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_cleanup_keeps_running_tasks() {
        let store = TaskStore::with_config(10, 0);
        store.create(task("running")).await;
        store.create(task("done")).await;
        store.finish("done", DeployStatus::Success, None).await;

        // retention 0 小时：已完成的立即过期，运行中的必须保留
        store.cleanup_expired().await;
        assert!(store.get("running").await.is_some());
        assert!(store.get("done").await.is_none());
    }
}
