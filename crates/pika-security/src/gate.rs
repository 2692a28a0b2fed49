// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and transport gate.
//!
//! Three checks, in order: the shared-secret header, the source network,
//! and the sender allow-list. The first two run before the request body is
//! even parsed; the third needs the sender identity out of the body. Every
//! rejection writes exactly one audit event on the `pika::audit` target.

use std::net::IpAddr;

use pika_config::model::TelegramConfig;
use pika_core::{PikaError, SenderId, TrustedNetwork};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

/// Why the gate refused a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateRejection {
    #[error("shared-secret header is missing")]
    MissingSecret,

    #[error("shared secret does not match")]
    BadSecret,

    #[error("source address could not be determined")]
    UnknownOrigin,

    #[error("source address {0} is outside the trusted networks")]
    UntrustedOrigin(IpAddr),

    #[error("sender is not on the allow-list")]
    UnlistedSender,
}

impl GateRejection {
    /// Authentication failures concern the calling transport; the only
    /// authorization failure concerns the sender.
    pub fn is_authentication(&self) -> bool {
        !matches!(self, GateRejection::UnlistedSender)
    }

    /// Stable reason code for audit logs.
    pub fn code(&self) -> &'static str {
        match self {
            GateRejection::MissingSecret => "missing_secret",
            GateRejection::BadSecret => "bad_secret",
            GateRejection::UnknownOrigin => "unknown_origin",
            GateRejection::UntrustedOrigin(_) => "untrusted_origin",
            GateRejection::UnlistedSender => "unlisted_sender",
        }
    }
}

/// The gate's configuration, fixed at startup.
pub struct Gate {
    secret_digest: [u8; 32],
    networks: Vec<TrustedNetwork>,
    allowed_users: Vec<String>,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("secret", &"[REDACTED]")
            .field("networks", &self.networks)
            .field("allowed_users", &self.allowed_users.len())
            .finish()
    }
}

impl Gate {
    /// Builds a gate. An empty secret is a configuration error: the gate
    /// never runs without one.
    pub fn new(
        secret: &str,
        networks: Vec<TrustedNetwork>,
        allowed_users: Vec<String>,
    ) -> Result<Self, PikaError> {
        if secret.is_empty() {
            return Err(PikaError::Config(
                "the webhook shared secret must not be empty".into(),
            ));
        }
        Ok(Self {
            secret_digest: digest(secret),
            networks,
            allowed_users: allowed_users
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .collect(),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, PikaError> {
        let secret = config.secret_token.as_deref().unwrap_or_default();
        let networks = config
            .trusted_networks
            .iter()
            .map(|n| {
                n.parse::<TrustedNetwork>()
                    .map_err(|e| PikaError::Config(format!("trusted network `{n}`: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(secret, networks, config.allowed_users.clone())
    }

    /// Checks (a) and (b): the shared secret, then the source network.
    pub fn authenticate(
        &self,
        secret: Option<&str>,
        source: Option<IpAddr>,
    ) -> Result<(), GateRejection> {
        let result = self.check_transport(secret, source);
        if let Err(rejection) = result {
            warn!(
                target: "pika::audit",
                reason = rejection.code(),
                source = %source.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".into()),
                "inbound call rejected"
            );
        }
        result
    }

    fn check_transport(
        &self,
        secret: Option<&str>,
        source: Option<IpAddr>,
    ) -> Result<(), GateRejection> {
        let secret = secret.ok_or(GateRejection::MissingSecret)?;
        if !constant_time_eq(&digest(secret), &self.secret_digest) {
            return Err(GateRejection::BadSecret);
        }

        let ip = source.ok_or(GateRejection::UnknownOrigin)?;
        if !self.networks.iter().any(|n| n.contains(ip)) {
            return Err(GateRejection::UntrustedOrigin(ip));
        }
        Ok(())
    }

    /// Check (c): the numeric sender id is allow-listed. Usernames are never
    /// consulted; they can be released and claimed by another account. An
    /// empty allow-list denies everyone.
    pub fn authorize(&self, sender: &SenderId) -> Result<(), GateRejection> {
        if self.allowed_users.iter().any(|allowed| *allowed == sender.0) {
            return Ok(());
        }

        warn!(
            target: "pika::audit",
            reason = GateRejection::UnlistedSender.code(),
            sender = %sender,
            "sender refused"
        );
        Err(GateRejection::UnlistedSender)
    }
}

/// Digests make the comparison length-independent: a wrong secret of any
/// length costs the same to reject.
fn digest(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
