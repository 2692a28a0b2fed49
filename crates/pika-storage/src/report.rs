// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! What an executor hands back: a bounded summary of the statement's effect,
//! or an error that carries a correlation id instead of database detail.

use thiserror::Error;
use tracing::error;

/// Longest rendered value kept in a read sample, in characters.
pub const MAX_VALUE_CHARS: usize = 40;

/// Rendering of SQL `NULL` in a read sample.
pub const NULL_VALUE: &str = "NULL";

/// The effect of one executed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionReport {
    /// A read. `row_count` counts every row; `sample` keeps at most the
    /// configured number of them, each value truncated.
    Read {
        row_count: usize,
        columns: Vec<String>,
        sample: Vec<Vec<String>>,
    },
    /// An insert or update.
    Write { rows_affected: u64 },
}

/// A failed execution. The transaction was rolled back.
///
/// `detail` is for the logs only; the sender sees nothing but the
/// correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("statement execution failed (ref {correlation_id})")]
pub struct ExecutionError {
    pub correlation_id: String,
    pub detail: String,
}

impl ExecutionError {
    /// Creates the error under a fresh correlation id and logs its detail.
    pub fn new(detail: impl Into<String>) -> Self {
        let err = Self {
            correlation_id: correlation_id(),
            detail: detail.into(),
        };
        error!(
            correlation_id = %err.correlation_id,
            detail = %err.detail,
            "statement execution failed"
        );
        err
    }
}

/// Eight hex characters, enough to find one failure in the logs.
fn correlation_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

/// Truncates a rendered value to [`MAX_VALUE_CHARS`] characters.
pub fn truncate_value(value: &str) -> String {
    if value.chars().count() <= MAX_VALUE_CHARS {
        return value.to_string();
    }
    let mut out: String = value.chars().take(MAX_VALUE_CHARS - 1).collect();
    out.push('…');
    out
}

/// Collects a read result while keeping only a bounded sample.
#[derive(Debug)]
pub(crate) struct ReadCollector {
    limit: usize,
    row_count: usize,
    columns: Vec<String>,
    sample: Vec<Vec<String>>,
}

impl ReadCollector {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit,
            row_count: 0,
            columns: Vec::new(),
            sample: Vec::new(),
        }
    }

    pub(crate) fn set_columns(&mut self, columns: Vec<String>) {
        if self.columns.is_empty() {
            self.columns = columns;
        }
    }

    /// Whether the next row is still kept in the sample.
    pub(crate) fn sampling(&self) -> bool {
        self.sample.len() < self.limit
    }

    /// Counts a row and keeps its values while the sample has room.
    pub(crate) fn push_row(&mut self, values: Option<Vec<String>>) {
        self.row_count += 1;
        if let Some(values) = values
            && self.sampling()
        {
            self.sample.push(values);
        }
    }

    pub(crate) fn finish(self) -> ExecutionReport {
        ExecutionReport::Read {
            row_count: self.row_count,
            columns: self.columns,
            sample: self.sample,
        }
    }
}
