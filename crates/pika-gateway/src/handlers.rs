// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers: the Telegram webhook and the liveness check.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pika_core::{ChannelAdapter, OutboundMessage};
use serde::Serialize;
use tracing::{debug, warn};

use crate::server::GatewayState;

/// Acknowledgement body for the webhook.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// POST /telegram/webhook
///
/// Runs after transport authentication. Every well-formed update is
/// acknowledged with 200 so Telegram never redelivers it; processing
/// continues on the state's task tracker, which shutdown drains.
pub async fn post_webhook(State(state): State<GatewayState>, body: Bytes) -> Response {
    let message = match pika_telegram::parse_update(&body) {
        Ok(Some(message)) => message,
        Ok(None) => return ack(),
        Err(e) => {
            debug!(error = %e, "rejecting malformed webhook body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if state.gate.authorize(&message.sender).is_err() {
        if let Some(reply) = state.dispatcher.refuse(&message) {
            state.tasks.spawn(deliver(state.channel.clone(), reply));
        }
        return ack();
    }

    let dispatcher = state.dispatcher.clone();
    let channel = state.channel.clone();
    state.tasks.spawn(async move {
        if let Some(reply) = dispatcher.handle(&message).await {
            deliver(channel, reply).await;
        }
    });

    ack()
}

/// GET /health
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn ack() -> Response {
    (StatusCode::OK, Json(WebhookAck { ok: true })).into_response()
}

async fn deliver(channel: Arc<dyn ChannelAdapter>, reply: OutboundMessage) {
    let conversation = reply.conversation.clone();
    if let Err(e) = channel.send(reply).await {
        warn!(error = %e, conversation = %conversation, "failed to deliver reply");
    }
}
