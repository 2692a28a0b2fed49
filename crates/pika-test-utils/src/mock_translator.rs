// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock statement translator for deterministic testing.
//!
//! `MockTranslator` implements `StatementTranslator` with pre-configured
//! answers, enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use pika_core::traits::adapter::PluginAdapter;
use pika_core::traits::translator::StatementTranslator;
use pika_core::types::{AdapterType, HealthStatus, Translation, TranslationRequest};
use pika_core::{PikaError, TranslationError};

/// A mock translator that returns pre-configured answers.
///
/// Answers are popped from a FIFO queue. When the queue is empty the
/// translator fails with [`TranslationError::Empty`]. Every request is
/// recorded for assertions.
pub struct MockTranslator {
    answers: Arc<Mutex<VecDeque<Result<Translation, TranslationError>>>>,
    requests: Arc<Mutex<Vec<TranslationRequest>>>,
}

impl MockTranslator {
    /// Create a new mock translator with an empty answer queue.
    pub fn new() -> Self {
        Self::with_answers(Vec::new())
    }

    /// Create a mock translator pre-loaded with the given answers.
    pub fn with_answers(answers: Vec<Result<Translation, TranslationError>>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(VecDeque::from(answers))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a candidate statement.
    pub async fn push_statement(&self, sql: &str, summary: &str) {
        self.push(Ok(Translation::Statement {
            sql: sql.to_string(),
            summary: summary.to_string(),
        }))
        .await;
    }

    /// Queue any answer, failures included.
    pub async fn push(&self, answer: Result<Translation, TranslationError>) {
        self.answers.lock().await.push_back(answer);
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTranslator {
    fn name(&self) -> &str {
        "mock-translator"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Translator
    }

    async fn health_check(&self) -> Result<HealthStatus, PikaError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PikaError> {
        Ok(())
    }
}

#[async_trait]
impl StatementTranslator for MockTranslator {
    async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> Result<Translation, TranslationError> {
        self.requests.lock().await.push(request.clone());
        self.answers
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(TranslationError::Empty))
    }
}
