// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Pika sales gateway.

use thiserror::Error;

/// Infrastructure error shared by every adapter trait and the service wiring.
///
/// Domain outcomes that the sender sees (a refused statement, a translation
/// the oracle could not produce) have their own types; this enum covers the
/// failures of the machinery underneath them.
#[derive(Debug, Error)]
pub enum PikaError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Relational store errors (connection, migration, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Chat transport errors (bad update payload, send failure).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Statement translator errors raised outside a translation call
    /// (client construction, bad credentials).
    #[error("translator error: {message}")]
    Translator {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Why the statement translator could not produce a candidate.
///
/// Every variant is surfaced to the sender the same way (a request to
/// rephrase); the distinction exists for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    /// The call exceeded its time limit on every attempt.
    #[error("translator timed out")]
    Timeout,

    /// The translator could not be reached (connection refused, DNS, TLS).
    #[error("translator unavailable: {0}")]
    Unavailable(String),

    /// The translator answered with a non-success status.
    #[error("translator returned HTTP {status}")]
    Upstream { status: u16 },

    /// The response carried no usable content.
    #[error("translator returned an empty response")]
    Empty,

    /// The response could not be parsed into a translation.
    #[error("malformed translator response: {0}")]
    Malformed(String),

    /// The response carried more than one statement.
    #[error("translator returned more than one statement")]
    MultipleStatements,
}
