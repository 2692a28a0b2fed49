// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram chat transport for the Pika sales gateway.
//!
//! Inbound updates arrive through the webhook and are parsed by
//! [`handler::parse_update`]; [`TelegramChannel`] sends the replies back
//! through the Bot API.

pub mod handler;

use async_trait::async_trait;
use pika_config::model::TelegramConfig;
use pika_core::error::PikaError;
use pika_core::traits::{ChannelAdapter, PluginAdapter};
use pika_core::types::{AdapterType, HealthStatus, MessageId, OutboundMessage};
use teloxide::prelude::*;
use teloxide::types::{ChatId, ReplyParameters};
use tracing::debug;

pub use handler::parse_update;

/// Telegram channel adapter implementing [`ChannelAdapter`].
///
/// Replies are plain text, threaded under the message they answer.
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    /// Creates a new Telegram channel adapter.
    ///
    /// Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, PikaError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            PikaError::Config("telegram.bot_token is required for the Telegram channel".into())
        })?;

        if token.trim().is_empty() {
            return Err(PikaError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        Ok(Self {
            bot: Bot::new(token),
        })
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, PikaError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), PikaError> {
        debug!("Telegram channel shutting down");
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for TelegramChannel {
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, PikaError> {
        let chat_id = parse_chat_id(&msg.conversation)?;
        let reply_to = msg.reply_to.as_ref().and_then(parse_message_id);

        let mut request = self.bot.send_message(chat_id, msg.text);
        if let Some(id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(id).allow_sending_without_reply());
        }

        let sent = request.await.map_err(|e| PikaError::Channel {
            message: format!("failed to send message: {e}"),
            source: Some(Box::new(e)),
        })?;

        Ok(MessageId(sent.id.0.to_string()))
    }
}

fn parse_chat_id(conversation: &str) -> Result<ChatId, PikaError> {
    conversation
        .parse::<i64>()
        .map(ChatId)
        .map_err(|e| PikaError::Channel {
            message: format!("invalid chat id `{conversation}`: {e}"),
            source: None,
        })
}

/// A reply target that does not parse is dropped; the reply is still sent.
fn parse_message_id(id: &MessageId) -> Option<teloxide::types::MessageId> {
    id.0.parse::<i32>().ok().map(teloxide::types::MessageId)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(String::from),
            ..TelegramConfig::default()
        }
    }

    #[test]
    fn new_requires_bot_token() {
        assert!(matches!(
            TelegramChannel::new(&config(None)),
            Err(PikaError::Config(_))
        ));
    }

    #[test]
    fn new_rejects_empty_token() {
        assert!(TelegramChannel::new(&config(Some("  "))).is_err());
    }

    #[test]
    fn new_accepts_valid_token() {
        let channel =
            TelegramChannel::new(&config(Some("123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11")));
        assert!(channel.is_ok());
    }

    #[test]
    fn chat_ids_parse_including_groups() {
        assert_eq!(parse_chat_id("12345").unwrap(), ChatId(12345));
        assert_eq!(parse_chat_id("-100123").unwrap(), ChatId(-100123));
        assert!(matches!(
            parse_chat_id("telegram"),
            Err(PikaError::Channel { .. })
        ));
    }

    #[test]
    fn reply_target_parses_or_is_dropped() {
        assert_eq!(
            parse_message_id(&MessageId("77".into())),
            Some(teloxide::types::MessageId(77))
        );
        assert_eq!(parse_message_id(&MessageId("mock-msg-1".into())), None);
    }

    #[tokio::test]
    async fn send_to_invalid_chat_fails_before_any_request() {
        let channel = TelegramChannel::new(&config(Some("test:token"))).unwrap();
        let result = channel
            .send(OutboundMessage {
                conversation: "not-a-chat".into(),
                reply_to: None,
                text: "hola".into(),
            })
            .await;
        assert!(matches!(result, Err(PikaError::Channel { .. })));
    }

    #[test]
    fn plugin_adapter_metadata() {
        let channel = TelegramChannel::new(&config(Some("test:token"))).unwrap();
        assert_eq!(channel.name(), "telegram");
        assert_eq!(channel.version(), semver::Version::new(0, 1, 0));
        assert_eq!(channel.adapter_type(), AdapterType::Channel);
    }
}
