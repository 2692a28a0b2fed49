// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite connection management: PRAGMA setup, WAL mode, migrations.
//!
//! Every statement is serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use std::path::Path;

use pika_core::PikaError;
use tracing::debug;

use crate::migrations::run_migrations;

/// Handle to the embedded sales database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database file at `path` and applies
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, PikaError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| PikaError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| PikaError::Storage {
                source: Box::new(e),
            })?;
        let db = Self::initialize(conn).await?;
        debug!(path, "SQLite database opened");
        Ok(db)
    }

    /// Opens a private in-memory database with the schema applied.
    pub async fn open_in_memory() -> Result<Self, PikaError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| PikaError::Storage {
                source: Box::new(e),
            })?;
        Self::initialize(conn).await
    }

    async fn initialize(conn: tokio_rusqlite::Connection) -> Result<Self, PikaError> {
        conn.call(|conn| -> Result<Result<(), PikaError>, rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            )?;
            Ok(run_migrations(conn))
        })
        .await
        .map_err(map_tr_err)??;
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }
}

/// Convert a tokio-rusqlite error into PikaError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> PikaError {
    PikaError::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn relation_names(db: &Database) -> Vec<String> {
        db.connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') \
                     AND name NOT LIKE 'sqlite_%' AND name NOT LIKE 'refinery_%' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn migrations_create_tables_and_views() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(
            relation_names(&db).await,
            vec![
                "clients",
                "order_items",
                "orders",
                "products",
                "v_client_summary",
                "v_orders_with_client",
                "v_sales_by_month",
                "v_top_products",
            ]
        );
    }

    #[tokio::test]
    async fn reopening_a_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pika.db");
        let path = path.to_str().unwrap();

        let first = Database::open(path).await.unwrap();
        first
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO clients (name, source_client_id) VALUES ('Ana', 'telegram_ana_1')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        drop(first);

        let second = Database::open(path).await.unwrap();
        let count: i64 = second
            .connection()
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn schema_constraints_hold() {
        let db = Database::open_in_memory().await.unwrap();
        let result = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO orders (status) VALUES ('shipped')",
                    [],
                )?;
                Ok(())
            })
            .await;
        assert!(result.is_err(), "status outside the enumeration must fail");
    }
}
