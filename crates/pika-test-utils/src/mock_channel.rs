// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` and captures every outbound
//! message for assertion in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use pika_core::PikaError;
use pika_core::traits::adapter::PluginAdapter;
use pika_core::traits::channel::ChannelAdapter;
use pika_core::types::{AdapterType, HealthStatus, MessageId, OutboundMessage};

/// A mock chat channel for testing.
pub struct MockChannel {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    notify: Arc<Notify>,
    next_id: AtomicU64,
}

impl MockChannel {
    /// Create a new mock channel with nothing sent.
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            notify: Arc::new(Notify::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Get all messages that were sent through `send()`.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Get the count of sent messages.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Clear all sent messages.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    /// Waits until at least `count` messages were sent. Replies are sent
    /// from a spawned task in the gateway, so tests need to wait for them.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<OutboundMessage> {
        loop {
            let notified = self.notify.notified();
            {
                let sent = self.sent.lock().await;
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            notified.await;
        }
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, PikaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PikaError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, PikaError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sent.lock().await.push(msg);
        self.notify.notify_waiters();
        Ok(MessageId(format!("mock-msg-{id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn outbound(text: &str) -> OutboundMessage {
        OutboundMessage {
            conversation: "1001".into(),
            reply_to: Some(MessageId("7".into())),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn send_captures_outbound_messages() {
        let channel = MockChannel::new();
        let id = channel.send(outbound("hola")).await.unwrap();
        assert_eq!(id, MessageId("mock-msg-1".into()));

        let sent = channel.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "hola");
        assert_eq!(sent[0].reply_to, Some(MessageId("7".into())));
    }

    #[tokio::test]
    async fn sent_count_and_clear() {
        let channel = MockChannel::new();
        channel.send(outbound("a")).await.unwrap();
        channel.send(outbound("b")).await.unwrap();
        assert_eq!(channel.sent_count().await, 2);
        channel.clear_sent().await;
        assert_eq!(channel.sent_count().await, 0);
    }

    #[tokio::test]
    async fn wait_for_sent_wakes_on_send() {
        let channel = Arc::new(MockChannel::new());
        let waiter = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.wait_for_sent(1).await })
        };
        tokio::task::yield_now().await;
        channel.send(outbound("listo")).await.unwrap();

        let sent = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent[0].text, "listo");
    }
}
