// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel adapter trait for the chat transport.

use async_trait::async_trait;

use crate::error::PikaError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageId, OutboundMessage};

/// Outbound half of the chat transport.
///
/// Inbound delivery happens through the webhook, so the adapter only needs
/// to send replies.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Sends a plain text message and returns the transport's id for it.
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, PikaError>;
}
