// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PostgreSQL executor.
//!
//! Each statement gets its own connection and transaction. The statement is
//! sent over the simple-query protocol, which returns every value as text,
//! and `SET LOCAL statement_timeout` bounds it on the server as well.
//! Result rows are consumed as they arrive: a read keeps its sample and a
//! running count, never the whole result set.

use std::pin::pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use pika_config::model::DatabaseConfig;
use pika_core::{AdapterType, HealthStatus, PikaError, PluginAdapter};
use pika_sql::ValidatedStatement;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage, SimpleQueryRow};
use tracing::{debug, error, warn};

use crate::StatementExecutor;
use crate::report::{ExecutionError, ExecutionReport, NULL_VALUE, ReadCollector, truncate_value};

/// Runs validated statements against a PostgreSQL server.
pub struct PostgresExecutor {
    config: tokio_postgres::Config,
    sample_rows: usize,
    timeout: Duration,
}

impl PostgresExecutor {
    pub fn new(config: &DatabaseConfig) -> Self {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .user(&config.user)
            .dbname(&config.name)
            .application_name("pika")
            .connect_timeout(Duration::from_secs(config.statement_timeout_secs));
        if let Some(password) = &config.password {
            pg.password(password);
        }
        Self {
            config: pg,
            sample_rows: config.sample_rows,
            timeout: Duration::from_secs(config.statement_timeout_secs),
        }
    }

    async fn connect(&self) -> Result<Client, tokio_postgres::Error> {
        let (client, connection) = self.config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "postgres connection error");
            }
        });
        Ok(client)
    }

    async fn run(&self, statement: &ValidatedStatement) -> Result<ExecutionReport, tokio_postgres::Error> {
        let mut client = self.connect().await?;
        let tx = client.transaction().await?;
        tx.batch_execute(&format!(
            "SET LOCAL statement_timeout = {}",
            self.timeout.as_millis()
        ))
        .await?;

        let mut messages = pin!(tx.client().simple_query_raw(statement.sql()).await?);
        let mut collector = ReadCollector::new(self.sample_rows);
        let mut rows_affected = 0;
        while let Some(message) = messages.try_next().await? {
            match message {
                SimpleQueryMessage::RowDescription(columns) => {
                    collector.set_columns(columns.iter().map(|c| c.name().to_string()).collect());
                }
                SimpleQueryMessage::Row(row) => {
                    let values = collector.sampling().then(|| render_row(&row));
                    collector.push_row(values);
                }
                SimpleQueryMessage::CommandComplete(n) => rows_affected += n,
                _ => {}
            }
        }

        let report = if statement.kind().is_write() {
            ExecutionReport::Write { rows_affected }
        } else {
            collector.finish()
        };

        tx.commit().await?;
        Ok(report)
    }
}

fn render_row(row: &SimpleQueryRow) -> Vec<String> {
    (0..row.len())
        .map(|i| row.get(i).map_or_else(|| NULL_VALUE.to_string(), truncate_value))
        .collect()
}

#[async_trait]
impl PluginAdapter for PostgresExecutor {
    fn name(&self) -> &str {
        "postgres"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Executor
    }

    async fn health_check(&self) -> Result<HealthStatus, PikaError> {
        let ping = async {
            let client = self.connect().await?;
            client.simple_query("SELECT 1").await
        };
        match tokio::time::timeout(self.timeout, ping).await {
            Ok(Ok(_)) => Ok(HealthStatus::Healthy),
            Ok(Err(e)) => Ok(HealthStatus::Unhealthy(e.to_string())),
            Err(_) => Ok(HealthStatus::Unhealthy("connection timed out".into())),
        }
    }

    async fn shutdown(&self) -> Result<(), PikaError> {
        debug!("postgres executor shut down");
        Ok(())
    }
}

#[async_trait]
impl StatementExecutor for PostgresExecutor {
    async fn execute(
        &self,
        statement: &ValidatedStatement,
    ) -> Result<ExecutionReport, ExecutionError> {
        // Dropping the future drops the transaction and its connection, which
        // makes the server roll back.
        match tokio::time::timeout(self.timeout, self.run(statement)).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => Err(ExecutionError::new(e.to_string())),
            Err(_) => {
                warn!(timeout = ?self.timeout, "statement timed out");
                Err(ExecutionError::new(format!(
                    "statement exceeded {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pika_sql::Validator;

    fn unreachable_config() -> DatabaseConfig {
        DatabaseConfig {
            host: "127.0.0.1".into(),
            // Reserved port; nothing listens here.
            port: 9,
            password: Some("hunter2".into()),
            statement_timeout_secs: 2,
            ..DatabaseConfig::default()
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_an_execution_error() {
        let exec = PostgresExecutor::new(&unreachable_config());
        let statement = Validator::default()
            .validate("SELECT * FROM clients")
            .unwrap();
        let err = exec.execute(&statement).await.unwrap_err();
        assert_eq!(err.correlation_id.len(), 8);
        assert!(!err.to_string().contains("hunter2"));
    }

    // These need a scratch PostgreSQL database. Run with:
    // PIKA_TEST_PG_HOST=localhost PIKA_TEST_PG_DB=pika_test cargo test -p pika-storage -- --ignored

    fn scratch_config(sample_rows: usize) -> DatabaseConfig {
        let env = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.into());
        DatabaseConfig {
            host: env("PIKA_TEST_PG_HOST", "localhost"),
            user: env("PIKA_TEST_PG_USER", "postgres"),
            name: env("PIKA_TEST_PG_DB", "pika_test"),
            password: std::env::var("PIKA_TEST_PG_PASSWORD").ok(),
            sample_rows,
            statement_timeout_secs: 30,
            ..DatabaseConfig::default()
        }
    }

    async fn seed_products(exec: &PostgresExecutor, n: usize) {
        let client = exec.connect().await.unwrap();
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS products (
                     id SERIAL PRIMARY KEY, name VARCHAR(100) NOT NULL, variant VARCHAR(100));
                 TRUNCATE products;
                 INSERT INTO products (name, variant)
                     SELECT 'Arepa', 'v' || g FROM generate_series(1, {n}) AS g;"
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL server"]
    #[serial_test::serial(postgres)]
    async fn large_read_keeps_only_the_sample() {
        let exec = PostgresExecutor::new(&scratch_config(5));
        seed_products(&exec, 400).await;

        let statement = Validator::default()
            .validate("SELECT a.name, b.variant FROM products a, products b")
            .unwrap();
        let ExecutionReport::Read {
            row_count,
            columns,
            sample,
        } = exec.execute(&statement).await.unwrap()
        else {
            panic!("expected a read report");
        };
        assert_eq!(row_count, 160_000);
        assert_eq!(columns, vec!["name", "variant"]);
        assert_eq!(sample.len(), 5);
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL server"]
    #[serial_test::serial(postgres)]
    async fn empty_read_still_reports_columns() {
        let exec = PostgresExecutor::new(&scratch_config(5));
        seed_products(&exec, 3).await;

        let statement = Validator::default()
            .validate("SELECT name, variant FROM products WHERE name = 'Nada'")
            .unwrap();
        assert_eq!(
            exec.execute(&statement).await.unwrap(),
            ExecutionReport::Read {
                row_count: 0,
                columns: vec!["name".into(), "variant".into()],
                sample: vec![],
            }
        );

        let update = Validator::default()
            .validate("UPDATE products SET variant = 'x' WHERE name = 'Arepa'")
            .unwrap();
        assert_eq!(
            exec.execute(&update).await.unwrap(),
            ExecutionReport::Write { rows_affected: 3 }
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_unhealthy() {
        let exec = PostgresExecutor::new(&unreachable_config());
        assert!(matches!(
            exec.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
        assert_eq!(exec.adapter_type(), AdapterType::Executor);
    }
}
