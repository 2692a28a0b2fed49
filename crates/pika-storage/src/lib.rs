// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Statement executors for the Pika sales gateway.
//!
//! An executor takes one [`ValidatedStatement`], runs it in its own short
//! transaction under a time limit, and reports a bounded summary of the
//! effect. Two backends exist: PostgreSQL for deployments and an embedded
//! SQLite database, with the same schema migrated in, for local use and
//! tests.

pub mod database;
pub mod migrations;
pub mod postgres;
pub mod report;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pika_config::model::{DatabaseBackend, DatabaseConfig};
use pika_core::{PikaError, PluginAdapter};
use pika_sql::ValidatedStatement;
use tracing::info;

pub use database::Database;
pub use postgres::PostgresExecutor;
pub use report::{ExecutionError, ExecutionReport};
pub use sqlite::SqliteExecutor;

/// Runs statements the validator accepted.
///
/// Exactly one statement per call. On failure the transaction is rolled
/// back and the returned error carries a correlation id only.
#[async_trait]
pub trait StatementExecutor: PluginAdapter {
    async fn execute(
        &self,
        statement: &ValidatedStatement,
    ) -> Result<ExecutionReport, ExecutionError>;
}

/// Builds the executor selected by `database.backend`.
pub async fn open_executor(
    config: &DatabaseConfig,
) -> Result<Arc<dyn StatementExecutor>, PikaError> {
    match config.backend {
        DatabaseBackend::Postgres => {
            info!(host = %config.host, port = config.port, database = %config.name, "using PostgreSQL executor");
            Ok(Arc::new(PostgresExecutor::new(config)))
        }
        DatabaseBackend::Sqlite => {
            info!(path = %config.sqlite_path, "using SQLite executor");
            let db = Database::open(&config.sqlite_path).await?;
            let executor = SqliteExecutor::new(
                db,
                config.sample_rows,
                Duration::from_secs(config.statement_timeout_secs),
            )
            .await?;
            Ok(Arc::new(executor))
        }
    }
}
