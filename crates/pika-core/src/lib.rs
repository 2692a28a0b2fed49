// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Pika sales gateway.
//!
//! This crate provides the trait definitions, error types, and message
//! types shared by every other crate in the workspace. The chat channel and
//! the statement translator are adapters implementing traits defined here.

pub mod error;
pub mod net;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{PikaError, TranslationError};
pub use net::{NetworkParseError, TrustedNetwork};
pub use types::{
    AdapterType, ClarificationContext, HealthStatus, InboundMessage, MessageId,
    OutboundMessage, SenderId, Translation, TranslationRequest,
};

pub use traits::{ChannelAdapter, PluginAdapter, StatementTranslator};
