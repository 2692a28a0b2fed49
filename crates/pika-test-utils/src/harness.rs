// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the dispatcher with a mock translator, a mock
//! channel and a real SQLite executor on a temp database. `send()` drives a
//! message through the whole pipeline and returns the reply text.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pika_agent::{ComposerPolicy, Dispatcher, DispatcherSettings, SessionStore};
use pika_config::model::RefusalPolicy;
use pika_core::types::{AdapterType, HealthStatus, InboundMessage, MessageId, SenderId};
use pika_core::{ChannelAdapter, PikaError, PluginAdapter, Translation, TranslationError};
use pika_sql::ValidatedStatement;
use pika_storage::{Database, ExecutionError, ExecutionReport, SqliteExecutor, StatementExecutor};

use crate::mock_channel::MockChannel;
use crate::mock_translator::MockTranslator;

/// Sender id used by [`TestHarness::send`].
pub const DEFAULT_SENDER: &str = "1001";

/// Executor wrapper that counts calls, so tests can assert that a path
/// never touched the database.
pub struct RecordingExecutor {
    inner: SqliteExecutor,
    calls: AtomicUsize,
}

impl RecordingExecutor {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for RecordingExecutor {
    fn name(&self) -> &str {
        "recording-executor"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Executor
    }

    async fn health_check(&self) -> Result<HealthStatus, PikaError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), PikaError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn execute(
        &self,
        statement: &ValidatedStatement,
    ) -> Result<ExecutionReport, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(statement).await
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    answers: Vec<Result<Translation, TranslationError>>,
    confirm_writes: bool,
    refusal: RefusalPolicy,
    ttl: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            answers: Vec::new(),
            confirm_writes: true,
            refusal: RefusalPolicy::Generic,
            ttl: Duration::from_secs(900),
        }
    }

    /// Set mock translator answers.
    pub fn with_answers(mut self, answers: Vec<Result<Translation, TranslationError>>) -> Self {
        self.answers = answers;
        self
    }

    /// Run writes immediately instead of asking for confirmation.
    pub fn without_confirmation(mut self) -> Self {
        self.confirm_writes = false;
        self
    }

    pub fn with_refusal_policy(mut self, refusal: RefusalPolicy) -> Self {
        self.refusal = refusal;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, PikaError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| PikaError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("pika-test.db");
        let database = Database::open(&db_path.to_string_lossy()).await?;

        let executor = Arc::new(RecordingExecutor {
            inner: SqliteExecutor::new(database.clone(), 10, Duration::from_secs(5)).await?,
            calls: AtomicUsize::new(0),
        });
        let translator = Arc::new(MockTranslator::with_answers(self.answers));
        let channel = Arc::new(MockChannel::new());
        let sessions = Arc::new(SessionStore::new(self.ttl));

        let dispatcher = Arc::new(Dispatcher::new(
            translator.clone(),
            executor.clone(),
            sessions.clone(),
            DispatcherSettings {
                confirm_writes: self.confirm_writes,
                policy: ComposerPolicy {
                    refusal: self.refusal,
                },
            },
        ));

        Ok(TestHarness {
            translator,
            executor,
            channel,
            sessions,
            dispatcher,
            database,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// The mock statement translator.
    pub translator: Arc<MockTranslator>,
    /// SQLite executor on the temp database, with a call counter.
    pub executor: Arc<RecordingExecutor>,
    /// The mock channel replies are sent through.
    pub channel: Arc<MockChannel>,
    pub sessions: Arc<SessionStore>,
    pub dispatcher: Arc<Dispatcher>,
    /// Direct handle to the temp database for assertions.
    pub database: Database,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Sends `text` as [`DEFAULT_SENDER`]; see [`TestHarness::send_as`].
    pub async fn send(&self, text: &str) -> Option<String> {
        self.send_as(DEFAULT_SENDER, text).await
    }

    /// Drives one message through the dispatcher, sends the reply through
    /// the mock channel, and returns its text.
    pub async fn send_as(&self, sender: &str, text: &str) -> Option<String> {
        let message = inbound(sender, text);
        let reply = self.dispatcher.handle(&message).await?;
        let text = reply.text.clone();
        if let Err(e) = self.channel.send(reply).await {
            tracing::warn!(error = %e, "mock channel send failed");
        }
        Some(text)
    }

    /// Runs a scalar `COUNT(*)`-style query directly against the database.
    pub async fn count(&self, sql: &str) -> i64 {
        let sql = sql.to_string();
        self.database
            .connection()
            .call(move |conn| conn.query_row(&sql, [], |row| row.get::<_, i64>(0)))
            .await
            .unwrap_or(-1)
    }
}

/// Builds an inbound text message the way the Telegram parser would.
pub fn inbound(sender: &str, text: &str) -> InboundMessage {
    static NEXT_ID: AtomicUsize = AtomicUsize::new(1);
    InboundMessage {
        id: MessageId(NEXT_ID.fetch_add(1, Ordering::Relaxed).to_string()),
        sender: SenderId::from(sender),
        username: None,
        conversation: sender.to_string(),
        text: text.to_string(),
    }
}
