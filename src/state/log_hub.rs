//! 日志通道管理
//!
//! 管理任务日志的广播通道，支持 SSE 订阅和自动清理

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use crate::domain::deploy::{LogEvent, LogKind, LogSink};

/// 日志通道容量
const LOG_CHANNEL_CAPACITY: usize = 256;

/// 日志通道信息
struct LogChannel {
    /// 广播发送者；finish 后置 None，使订阅端在缓冲排空后收到 Closed
    sender: Option<broadcast::Sender<LogEvent>>,
    /// 创建时间
    created_at: DateTime<Utc>,
    /// 是否已完成
    finished: bool,
}

/// 日志中心
///
/// 每个部署任务一条广播通道。部署结束后 hub 侧的发送端被丢弃，
/// 订阅者排空缓冲即收到 Closed，由 SSE 层补发 complete 事件
pub struct LogHub {
    /// 通道映射 (task_id -> LogChannel)
    channels: RwLock<HashMap<String, LogChannel>>,
}

impl LogHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// 创建新的日志通道
    ///
    /// 如果通道已存在且未完成，返回现有的发送者
    pub async fn create(&self, task_id: &str) -> broadcast::Sender<LogEvent> {
        let mut channels = self.channels.write().await;

        if let Some(channel) = channels.get(task_id) {
            if let Some(ref sender) = channel.sender {
                return sender.clone();
            }
        }

        let (sender, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        channels.insert(
            task_id.to_string(),
            LogChannel {
                sender: Some(sender.clone()),
                created_at: Utc::now(),
                finished: false,
            },
        );

        sender
    }

    /// 订阅日志通道
    ///
    /// 返回接收者；通道不存在或已完成时返回 None
    pub async fn subscribe(&self, task_id: &str) -> Option<broadcast::Receiver<LogEvent>> {
        let channels = self.channels.read().await;
        channels
            .get(task_id)
            .and_then(|c| c.sender.as_ref())
            .map(|s| s.subscribe())
    }

    /// 标记通道完成并丢弃 hub 侧发送端
    ///
    /// 管道自己的发送端随 sink 一起析构，之后订阅者收到 Closed
    pub async fn finish(&self, task_id: &str) {
        let mut channels = self.channels.write().await;
        if let Some(channel) = channels.get_mut(task_id) {
            channel.finished = true;
            channel.sender = None;
        }
    }

    /// 检查通道是否已完成
    pub async fn is_finished(&self, task_id: &str) -> bool {
        let channels = self.channels.read().await;
        channels.get(task_id).map_or(true, |c| c.finished)
    }

    /// 检查通道是否存在
    pub async fn exists(&self, task_id: &str) -> bool {
        let channels = self.channels.read().await;
        channels.contains_key(task_id)
    }

    /// 清理已完成的通道
    ///
    /// 已完成的通道没有发送端也不再接受订阅，直接移除；
    /// 在途的接收者不受影响，缓冲里的事件仍会被排空
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, channel| !channel.finished);
    }

    /// 清理存活过久的通道（包括从未正常收尾的）
    pub async fn cleanup_expired(&self, max_age_hours: i64) {
        let now = Utc::now();
        let mut channels = self.channels.write().await;
        channels.retain(|_, channel| {
            !channel.finished && (now - channel.created_at).num_hours() < max_age_hours
        });
    }

    /// 获取通道数量
    pub async fn count(&self) -> usize {
        let channels = self.channels.read().await;
        channels.len()
    }
}

impl Default for LogHub {
    fn default() -> Self {
        Self::new()
    }
}

/// 广播通道 sink
///
/// 发送失败（没有订阅者）直接吞掉：sink 绝不反向影响部署流程
pub struct BroadcastSink {
    tx: broadcast::Sender<LogEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<LogEvent>) -> Self {
        Self { tx }
    }
}

impl LogSink for BroadcastSink {
    fn emit(&self, message: &str, kind: LogKind) {
        let _ = self.tx.send(LogEvent::new(kind, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_subscribe() {
        let hub = LogHub::new();

        let sender = hub.create("task-1").await;
        assert!(hub.exists("task-1").await);

        let mut receiver = hub.subscribe("task-1").await.unwrap();

        let sink = BroadcastSink::new(sender);
        sink.emit("Hello", LogKind::Info);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.message, "Hello");
        assert_eq!(event.kind, LogKind::Info);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_swallowed() {
        let hub = LogHub::new();
        let sender = hub.create("task-1").await;

        // 没有订阅者时 send 返回 Err，sink 必须吞掉而不是冒泡
        let sink = BroadcastSink::new(sender);
        sink.emit("nobody listening", LogKind::Stdout);
    }

    #[tokio::test]
    async fn test_subscriber_drains_buffer_after_finish() {
        let hub = LogHub::new();
        let sender = hub.create("task-1").await;
        let mut receiver = hub.subscribe("task-1").await.unwrap();

        let sink = BroadcastSink::new(sender);
        sink.emit("last words", LogKind::Info);

        hub.finish("task-1").await;
        drop(sink);

        // 缓冲里的事件先到，然后才是 Closed
        let event = receiver.recv().await.unwrap();
        assert_eq!(event.message, "last words");
        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_subscribe_after_finish_returns_none() {
        let hub = LogHub::new();
        let _sender = hub.create("task-1").await;

        hub.finish("task-1").await;
        assert!(hub.is_finished("task-1").await);
        assert!(hub.subscribe("task-1").await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_finished_channels() {
        let hub = LogHub::new();
        hub.create("done").await;
        hub.create("running").await;
        hub.finish("done").await;

        hub.cleanup().await;
        assert!(!hub.exists("done").await);
        assert!(hub.exists("running").await);
        assert_eq!(hub.count().await, 1);
    }

    #[tokio::test]
    async fn test_cleanup_expired_drops_stale_channels() {
        let hub = LogHub::new();
        hub.create("fresh").await;

        // max_age 0 小时：刚创建的也算过期
        hub.cleanup_expired(0).await;
        assert!(!hub.exists("fresh").await);
    }
}
