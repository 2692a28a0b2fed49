// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP front of the Pika sales gateway.
//!
//! Telegram posts updates to the webhook route; the gate middleware
//! authenticates the transport, the handler authorizes the sender and hands
//! the message to the dispatcher.

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{
    DRAIN_TIMEOUT, GatewayState, ServerConfig, WEBHOOK_PATH, drain, router, start_server,
};
