// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde cannot express: secrets that
//! must be present, CIDR ranges that must parse, non-zero ports and timeouts.

use pika_core::TrustedNetwork;

use crate::diagnostic::ConfigError;
use crate::model::{DatabaseBackend, PikaConfig};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// every collected validation error (does not fail fast).
pub fn validate_config(config: &PikaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.server.host.trim().is_empty() {
        fail("server.host must not be empty".to_string());
    }
    if config.server.port == 0 {
        fail("server.port must not be 0".to_string());
    }

    match config.telegram.secret_token.as_deref().map(str::trim) {
        None | Some("") => fail(
            "telegram.secret_token must be set: every webhook call is checked against it"
                .to_string(),
        ),
        Some(_) => {}
    }

    if config.telegram.trusted_networks.is_empty() {
        fail("telegram.trusted_networks must list at least one CIDR range".to_string());
    }
    for network in &config.telegram.trusted_networks {
        if let Err(e) = network.parse::<TrustedNetwork>() {
            fail(format!(
                "telegram.trusted_networks entry `{network}` is not a CIDR range: {e}"
            ));
        }
    }

    for user in &config.telegram.allowed_users {
        if user.parse::<u64>().is_err() {
            fail(format!(
                "telegram.allowed_users entry `{user}` is not a numeric Telegram user id"
            ));
        }
    }

    if config.openai.timeout_secs == 0 {
        fail("openai.timeout_secs must be at least 1".to_string());
    }
    if !(0.0..=2.0).contains(&config.openai.temperature) {
        fail(format!(
            "openai.temperature must be between 0.0 and 2.0, got {}",
            config.openai.temperature
        ));
    }

    match config.database.backend {
        DatabaseBackend::Postgres => {
            if config.database.host.trim().is_empty() {
                fail("database.host must not be empty".to_string());
            }
            if config.database.port == 0 {
                fail("database.port must not be 0".to_string());
            }
            if config.database.name.trim().is_empty() {
                fail("database.name must not be empty".to_string());
            }
        }
        DatabaseBackend::Sqlite => {
            if config.database.sqlite_path.trim().is_empty() {
                fail("database.sqlite_path must not be empty".to_string());
            }
        }
    }
    if config.database.statement_timeout_secs == 0 {
        fail("database.statement_timeout_secs must be at least 1".to_string());
    }
    if config.database.sample_rows == 0 {
        fail("database.sample_rows must be at least 1".to_string());
    }

    if config.session.ttl_secs == 0 {
        fail("session.ttl_secs must be at least 1".to_string());
    }
    if config.session.sweep_interval_secs == 0 {
        fail("session.sweep_interval_secs must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks that only matter when the gateway is about to serve traffic.
pub fn validate_for_serve(config: &PikaConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = match validate_config(config) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    if config.openai.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
        errors.push(ConfigError::MissingKey {
            key: "openai.api_key".to_string(),
        });
    }
    if config.telegram.bot_token.as_deref().is_none_or(|t| t.trim().is_empty()) {
        errors.push(ConfigError::MissingKey {
            key: "telegram.bot_token".to_string(),
        });
    }
    if config.telegram.allowed_users.is_empty() {
        tracing::warn!("telegram.allowed_users is empty: every sender will be refused");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
