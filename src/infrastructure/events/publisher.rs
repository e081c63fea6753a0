//! Event Publisher Implementation
//!
//! 基于 broadcast channel 的进度事件推送，外部显示层自行订阅

use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::application::ports::{PipelineEvent, ProgressReporterPort};

/// 默认通道容量
const CHANNEL_CAPACITY: usize = 256;

/// 事件发布器
pub struct EventPublisher {
    channel: broadcast::Sender<PipelineEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { channel: tx }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅事件流
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.channel.subscribe()
    }

    /// 事件的 JSON 表示，例如 `{"event":"BookStateChanged","data":{"state":"running"}}`
    pub fn to_json(event: &PipelineEvent) -> serde_json::Value {
        serde_json::to_value(event).unwrap_or_else(|e| json!({ "error": e.to_string() }))
    }

    /// 把事件以 JSON 写入 debug 日志，直到发布器关闭；返回记录的事件数
    ///
    /// 订阅者落后时跳过丢失的事件继续记录
    pub async fn log_events(mut events: broadcast::Receiver<PipelineEvent>) -> usize {
        let mut logged = 0;
        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::debug!(event = %Self::to_json(&event), "Pipeline event");
                    logged += 1;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Event log lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        logged
    }

    fn publish(&self, event: PipelineEvent) {
        if let Err(e) = self.channel.send(event) {
            tracing::trace!(error = %e, "Failed to publish event (no receivers)");
        }
    }
}

impl ProgressReporterPort for EventPublisher {
    fn report(&self, event: PipelineEvent) {
        self.publish(event);
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
