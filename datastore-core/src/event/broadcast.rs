//! 广播事件发布器
//!
//! 基于 `tokio::sync::broadcast`：
//! - `publish`：克隆并广播事件，无订阅者时忽略；
//! - `subscribe`：返回 `'static` 事件流，便于在 `tokio::spawn` 中消费；
//! - 订阅方落后导致丢失事件时，流中产出 `EventBus` 错误。
//!
use super::{DatastoreEvent, EventPublisher};
use crate::error::{DatastoreError, DatastoreResult as Result};
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

#[derive(Clone)]
pub struct BroadcastEventPublisher {
    tx: broadcast::Sender<DatastoreEvent>,
}

impl BroadcastEventPublisher {
    /// `capacity` 为广播缓冲区容量
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> BoxStream<'static, Result<DatastoreEvent>> {
        let rx = self.tx.subscribe();
        let stream = BroadcastStream::new(rx)
            .map(|r| r.map_err(|e| DatastoreError::event_bus(e.to_string())));
        Box::pin(stream)
    }
}

impl EventPublisher for BroadcastEventPublisher {
    fn publish(&self, event: &DatastoreEvent) {
        // 无订阅者时 send 返回错误，视为非致命
        if self.tx.send(event.clone()).is_err() {
            trace!(event = event.name(), "no subscribers for datastore event");
        }
    }
}
