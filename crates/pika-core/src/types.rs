// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the gateway pipeline and its adapters.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identity of the person sending a chat message, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SenderId(pub String);

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SenderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Unique identifier for a message within its conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays in the pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Translator,
    Executor,
}

/// A text message that passed the transport gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Transport message identifier, used to thread the reply.
    pub id: MessageId,
    /// Who sent it.
    pub sender: SenderId,
    /// The sender's handle, when the transport has one.
    pub username: Option<String>,
    /// Where the reply goes (a chat id for Telegram).
    pub conversation: String,
    /// The raw message text.
    pub text: String,
}

/// A plain text reply addressed to the conversation a message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub conversation: String,
    pub reply_to: Option<MessageId>,
    pub text: String,
}

impl OutboundMessage {
    /// Builds a reply to `inbound`.
    pub fn reply_to(inbound: &InboundMessage, text: impl Into<String>) -> Self {
        Self {
            conversation: inbound.conversation.clone(),
            reply_to: Some(inbound.id.clone()),
            text: text.into(),
        }
    }
}

/// The clarification the translator asked for, sent back with the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClarificationContext {
    /// The message that was ambiguous.
    pub original_message: String,
    /// The question the translator asked about it.
    pub question: String,
}

/// Everything the statement translator sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    /// Table names, columns, and allowed statement kinds.
    pub schema: String,
    /// The sender's message text.
    pub message: String,
    /// Present when `message` answers an earlier clarification question.
    pub clarification: Option<ClarificationContext>,
}

/// What the translator produced for a message.
///
/// A `Statement` is only ever a candidate: it carries untrusted text that
/// must pass the statement validator before anything runs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// A single candidate statement plus a short human summary of its effect.
    Statement { sql: String, summary: String },
    /// The request was ambiguous; ask the sender this question.
    Clarify { question: String },
    /// The message needs no statement (a greeting, a thank-you).
    Reply { text: String },
}
