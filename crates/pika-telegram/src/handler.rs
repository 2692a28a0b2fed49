// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook update parsing.
//!
//! Turns the raw body Telegram posts to the webhook into a
//! channel-agnostic [`InboundMessage`]. Only new text messages with a
//! sender are processed; every other update kind is acknowledged and
//! ignored.

use pika_core::error::PikaError;
use pika_core::types::{InboundMessage, MessageId, SenderId};
use teloxide::types::{Message, Update, UpdateKind};
use tracing::debug;

/// Parses a webhook body.
///
/// `Err` means the body is not a Telegram update at all (the gateway answers
/// 400); `Ok(None)` means a well-formed update there is nothing to do with.
pub fn parse_update(body: &[u8]) -> Result<Option<InboundMessage>, PikaError> {
    let update: Update = serde_json::from_slice(body).map_err(|e| PikaError::Channel {
        message: format!("malformed update: {e}"),
        source: Some(Box::new(e)),
    })?;

    match update.kind {
        UpdateKind::Message(msg) => Ok(to_inbound_message(&msg)),
        _ => {
            debug!(update_id = update.id.0, "ignoring non-message update");
            Ok(None)
        }
    }
}

/// Maps a text message to an [`InboundMessage`].
///
/// The sender is the `from` user; messages without one (channel posts) are
/// dropped. Replies go back to the chat the message came from.
pub fn to_inbound_message(msg: &Message) -> Option<InboundMessage> {
    let Some(text) = msg.text() else {
        debug!(msg_id = msg.id.0, "ignoring non-text message");
        return None;
    };
    let Some(user) = msg.from.as_ref() else {
        debug!(msg_id = msg.id.0, "ignoring message without a sender");
        return None;
    };

    Some(InboundMessage {
        id: MessageId(msg.id.0.to_string()),
        sender: SenderId(user.id.0.to_string()),
        username: user.username.clone(),
        conversation: msg.chat.id.0.to_string(),
        text: text.to_string(),
    })
}
