// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded migrations for the SQLite backend.
//!
//! The SQL files under `migrations/` are compiled into the binary with
//! `embed_migrations!` and applied whenever a database is opened. The
//! PostgreSQL deployment provisions its schema out of band.

use pika_core::PikaError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Applies every pending migration. Refinery records what it applied in
/// `refinery_schema_history`, so reopening a database is a no-op.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), PikaError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| PikaError::Storage {
            source: Box::new(e),
        })?;
    for migration in report.applied_migrations() {
        tracing::debug!(migration = %migration, "applied migration");
    }
    Ok(())
}
