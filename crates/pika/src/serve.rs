// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pika serve` command implementation.
//!
//! Wires the gate, translator, executor, session store and Telegram channel
//! into the webhook server, then runs until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use pika_agent::{Dispatcher, DispatcherSettings, SessionStore, shutdown};
use pika_config::PikaConfig;
use pika_core::{HealthStatus, PikaError};
use pika_gateway::{GatewayState, ServerConfig};
use pika_openai::OpenAiTranslator;
use pika_security::{Gate, RedactingWriter, SecretRegistry};
use pika_telegram::TelegramChannel;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Fills `openai.api_key` from `OPENAI_API_KEY` when the config leaves it
/// unset, so validation sees the key the translator will use.
pub fn apply_env_fallbacks(config: &mut PikaConfig) {
    if config.openai.api_key.is_none()
        && let Ok(key) = std::env::var("OPENAI_API_KEY")
    {
        config.openai.api_key = Some(key);
    }
}

/// Runs the `pika serve` command.
pub async fn run_serve(config: PikaConfig) -> Result<(), PikaError> {
    let secrets = secret_registry(&config);
    init_tracing(&config.agent.log_level, secrets);

    info!("starting pika serve");

    let gate = Arc::new(Gate::from_config(&config.telegram)?);
    let translator = Arc::new(OpenAiTranslator::new(&config.openai)?);
    let channel = Arc::new(TelegramChannel::new(&config.telegram)?);

    let executor = pika_storage::open_executor(&config.database).await?;
    match executor.health_check().await? {
        HealthStatus::Healthy => info!(executor = executor.name(), "database reachable"),
        status => warn!(executor = executor.name(), ?status, "database not healthy at startup"),
    }

    let sessions = Arc::new(SessionStore::new(Duration::from_secs(
        config.session.ttl_secs,
    )));
    let dispatcher = Arc::new(Dispatcher::new(
        translator,
        executor.clone(),
        sessions.clone(),
        DispatcherSettings::from_config(&config),
    ));

    let cancel = shutdown::install_signal_handler();
    let sweeper = shutdown::spawn_session_sweeper(
        sessions,
        Duration::from_secs(config.session.sweep_interval_secs),
        cancel.clone(),
    );

    let state = GatewayState {
        gate,
        dispatcher,
        channel,
        trust_forwarded_for: config.server.trust_forwarded_for,
        tasks: TaskTracker::new(),
    };
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    let result = pika_gateway::start_server(&server_config, state, cancel.clone()).await;

    // A bind failure returns before any signal; stop the sweeper either way.
    cancel.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "session sweeper task failed");
    }
    if let Err(e) = executor.shutdown().await {
        warn!(error = %e, "executor shutdown failed");
    }

    info!("pika serve stopped");
    result
}

/// Every configured secret value, for the log redactor.
fn secret_registry(config: &PikaConfig) -> SecretRegistry {
    let secrets = SecretRegistry::new();
    for value in [
        config.telegram.bot_token.as_deref(),
        config.telegram.secret_token.as_deref(),
        config.openai.api_key.as_deref(),
        config.database.password.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        secrets.add(value);
    }
    secrets
}

/// Initializes the tracing subscriber. `RUST_LOG` wins over the configured
/// level; all output passes through the redactor.
fn init_tracing(log_level: &str, secrets: SecretRegistry) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pika={log_level},warn")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(move || RedactingWriter::new(std::io::stderr(), secrets.clone()))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_collects_every_configured_secret() {
        let mut config = PikaConfig::default();
        config.telegram.bot_token = Some("123:token".into());
        config.telegram.secret_token = Some("hook-secret".into());
        config.openai.api_key = Some("sk-test".into());
        config.database.password = Some("hunter2".into());

        let secrets = secret_registry(&config);
        assert_eq!(secrets.len(), 4);
        let line = secrets.redact("token=123:token secret=hook-secret pw=hunter2");
        assert!(!line.contains("hook-secret"));
        assert!(!line.contains("hunter2"));
    }

    #[test]
    fn unset_secrets_are_skipped() {
        assert!(secret_registry(&PikaConfig::default()).is_empty());
    }

    #[test]
    fn explicit_api_key_is_kept() {
        let mut config = PikaConfig::default();
        config.openai.api_key = Some("sk-from-config".into());
        apply_env_fallbacks(&mut config);
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-from-config"));
    }
}
