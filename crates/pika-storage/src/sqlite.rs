// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded SQLite executor, used for local development and tests.
//!
//! All calls share one connection and run in order on its thread. A call
//! that times out is cancelled: if it has not started it never will, and if
//! it is running its statement is interrupted and the transaction rolled
//! back. The interrupt only fires while that call owns the connection.

use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pika_core::{AdapterType, HealthStatus, PikaError, PluginAdapter};
use pika_sql::{StatementKind, ValidatedStatement};
use rusqlite::types::ValueRef;
use tracing::{debug, warn};

use crate::database::{Database, map_tr_err};
use crate::report::{ExecutionError, ExecutionReport, NULL_VALUE, ReadCollector, truncate_value};
use crate::StatementExecutor;

/// Runs validated statements against a [`Database`].
pub struct SqliteExecutor {
    db: Database,
    interrupt: rusqlite::InterruptHandle,
    sample_rows: usize,
    timeout: Duration,
}

impl SqliteExecutor {
    pub async fn new(
        db: Database,
        sample_rows: usize,
        timeout: Duration,
    ) -> Result<Self, PikaError> {
        let interrupt = db
            .connection()
            .call(|conn| -> Result<_, rusqlite::Error> { Ok(conn.get_interrupt_handle()) })
            .await
            .map_err(map_tr_err)?;
        Ok(Self {
            db,
            interrupt,
            sample_rows,
            timeout,
        })
    }

    /// The database this executor writes to.
    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Where a call is in its life on the connection thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Queued,
    Running,
    Finished,
    Cancelled,
}

/// Shared between one `execute` future and its closure on the connection
/// thread. The commit and the cancellation decision both happen under this
/// lock, so exactly one of them wins.
#[derive(Debug)]
struct Call(Mutex<CallState>);

impl Call {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(CallState::Queued)))
    }

    fn lock(&self) -> MutexGuard<'_, CallState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves a queued call to running. `false` if it was cancelled first.
    fn start(&self) -> bool {
        let mut state = self.lock();
        if *state == CallState::Cancelled {
            return false;
        }
        *state = CallState::Running;
        true
    }
}

/// Marks a call finished however its closure exits, unless it was cancelled.
struct FinishOnDrop<'a>(&'a Call);

impl Drop for FinishOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        if *state == CallState::Running {
            *state = CallState::Finished;
        }
    }
}

/// Runs one statement inside `tx`. Reads collect a bounded sample; writes
/// drain any rows the statement yields and report the change count.
fn run_statement(
    tx: &rusqlite::Transaction<'_>,
    sql: &str,
    kind: StatementKind,
    sample_rows: usize,
) -> Result<ExecutionReport, rusqlite::Error> {
    let mut stmt = tx.prepare(sql)?;

    if kind.is_write() {
        let mut rows = stmt.raw_query();
        while rows.next()?.is_some() {}
        return Ok(ExecutionReport::Write {
            rows_affected: tx.changes() as u64,
        });
    }

    let mut collector = ReadCollector::new(sample_rows);
    collector.set_columns(stmt.column_names().into_iter().map(String::from).collect());
    let column_count = stmt.column_count();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let values = if collector.sampling() {
            Some(
                (0..column_count)
                    .map(|i| row.get_ref(i).map(render_value))
                    .collect::<Result<Vec<_>, _>>()?,
            )
        } else {
            None
        };
        collector.push_row(values);
    }
    Ok(collector.finish())
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => NULL_VALUE.to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) => truncate_value(&String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

#[async_trait]
impl PluginAdapter for SqliteExecutor {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Executor
    }

    async fn health_check(&self) -> Result<HealthStatus, PikaError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PikaError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl StatementExecutor for SqliteExecutor {
    async fn execute(
        &self,
        statement: &ValidatedStatement,
    ) -> Result<ExecutionReport, ExecutionError> {
        let sql = statement.sql().to_string();
        let kind = statement.kind();
        let sample_rows = self.sample_rows;
        let call = Call::new();
        let worker_call = call.clone();

        let work = self
            .db
            .connection()
            .call(move |conn| -> Result<Option<ExecutionReport>, rusqlite::Error> {
                let call = worker_call;
                if !call.start() {
                    return Ok(None);
                }
                let _finish = FinishOnDrop(&call);

                // Dropping the transaction without commit rolls it back.
                let tx = conn.transaction()?;
                let report = run_statement(&tx, &sql, kind, sample_rows)?;

                let mut state = call.lock();
                if *state == CallState::Cancelled {
                    return Ok(None);
                }
                tx.commit()?;
                *state = CallState::Finished;
                Ok(Some(report))
            });
        let mut work = pin!(work);

        let timed_out = || ExecutionError::new(format!("statement exceeded {:?}", self.timeout));

        match tokio::time::timeout(self.timeout, &mut work).await {
            Ok(Ok(Some(report))) => return Ok(report),
            Ok(Ok(None)) => return Err(timed_out()),
            Ok(Err(e)) => return Err(ExecutionError::new(e.to_string())),
            Err(_) => {}
        }

        let settle = {
            let mut state = call.lock();
            match *state {
                CallState::Queued => {
                    *state = CallState::Cancelled;
                    false
                }
                CallState::Running => {
                    warn!(timeout = ?self.timeout, "statement timed out, interrupting");
                    *state = CallState::Cancelled;
                    self.interrupt.interrupt();
                    true
                }
                CallState::Finished | CallState::Cancelled => true,
            }
        };
        if !settle {
            warn!(timeout = ?self.timeout, "statement timed out before it started");
            return Err(timed_out());
        }

        // The closure is already past its decision point, or about to be;
        // its result says whether the transaction committed.
        match work.await {
            Ok(Some(report)) => Ok(report),
            Ok(None) => Err(timed_out()),
            Err(e) => Err(ExecutionError::new(format!(
                "statement exceeded {:?}: {e}",
                self.timeout
            ))),
        }
    }
}
