//! Outbound side of the broker connection
//!
//! Everything the bridge sends goes through the `MessageSink` trait. The
//! production implementation is rumqttc's `AsyncClient`, whose requests are
//! queued on a channel drained by the single `EventLoop`, so clones of the
//! client may publish from any task without further coordination.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};

/// Quality of service for every packet the bridge sends or subscribes with
pub const QOS: QoS = QoS::AtMostOnce;

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> anyhow::Result<()>;

    async fn subscribe(&self, topic: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl MessageSink for AsyncClient {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> anyhow::Result<()> {
        AsyncClient::publish(self, topic, QOS, retain, payload.as_bytes().to_vec())
            .await
            .with_context(|| format!("failed to publish to {topic}"))
    }

    async fn subscribe(&self, topic: &str) -> anyhow::Result<()> {
        AsyncClient::subscribe(self, topic, QOS)
            .await
            .with_context(|| format!("failed to subscribe to {topic}"))
    }
}

/// A message handed to a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// In-memory sink recording every request in order
///
/// Clones share the same log. Useful for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    published: Arc<Mutex<Vec<Published>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<Published> {
        self.published
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Published messages for a single topic, oldest first
    pub fn published_to(&self, topic: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|message| message.topic == topic)
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut log) = self.published.lock() {
            log.clear();
        }
        if let Ok(mut log) = self.subscriptions.lock() {
            log.clear();
        }
    }
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> anyhow::Result<()> {
        let mut log = self
            .published
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink poisoned"))?;
        log.push(Published {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> anyhow::Result<()> {
        let mut log = self
            .subscriptions
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink poisoned"))?;
        log.push(topic.to_string());
        Ok(())
    }
}
