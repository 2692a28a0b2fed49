// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport authentication middleware for the webhook.
//!
//! Runs gate checks (a) and (b) before the body is read: the shared-secret
//! header, then the source address. Failures answer 401 with an empty body.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::server::GatewayState;

/// Header Telegram fills with the secret registered through `setWebhook`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Middleware that authenticates the calling transport.
pub async fn auth_middleware(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let secret = request
        .headers()
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let source = source_address(request.headers(), peer, state.trust_forwarded_for);

    match state.gate.authenticate(secret, source) {
        Ok(()) => Ok(next.run(request).await),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// The address the gate checks: the TCP peer, or the proxy-reported client
/// when forwarded headers are trusted.
///
/// With trust enabled a request without a parseable forwarded header has
/// no known origin; the peer is then the proxy itself.
pub fn source_address(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trust_forwarded_for: bool,
) -> Option<IpAddr> {
    if !trust_forwarded_for {
        return peer;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse().ok())
    })
}
