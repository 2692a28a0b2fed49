// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Pika integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockTranslator`] - Mock statement translator with queued answers
//! - [`MockChannel`] - Mock chat channel that captures outbound messages
//! - [`TestHarness`] - Dispatcher wired to the mocks and a temp SQLite database

pub mod harness;
pub mod mock_channel;
pub mod mock_translator;

pub use harness::{DEFAULT_SENDER, RecordingExecutor, TestHarness, inbound};
pub use mock_channel::MockChannel;
pub use mock_translator::MockTranslator;
