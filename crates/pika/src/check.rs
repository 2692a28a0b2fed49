// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pika check-config` and `pika validate`: offline operator checks.
//!
//! Both return the process exit code instead of exiting, so they can be
//! tested.

use std::io::Read;

use pika_config::{DatabaseBackend, PikaConfig};
use pika_sql::Validator;

/// Validates `config` for serving and prints a summary. Exit code 0 when
/// the gateway could start with it.
pub fn run_check_config(config: &PikaConfig) -> i32 {
    if let Err(errors) = pika_config::validate_for_serve(config) {
        pika_config::render_errors(&errors);
        return 1;
    }
    println!("{}", summary(config));
    0
}

fn summary(config: &PikaConfig) -> String {
    let database = match config.database.backend {
        DatabaseBackend::Postgres => format!(
            "postgres {}@{}:{}/{}",
            config.database.user, config.database.host, config.database.port, config.database.name
        ),
        DatabaseBackend::Sqlite => format!("sqlite {}", config.database.sqlite_path),
    };
    format!(
        "configuration OK\n  listen:           {}:{}\n  database:         {}\n  model:            {}\n  allowed senders:  {}\n  trusted networks: {}\n  confirm writes:   {}",
        config.server.host,
        config.server.port,
        database,
        config.openai.model,
        config.telegram.allowed_users.len(),
        config.telegram.trusted_networks.join(", "),
        config.session.confirm_writes,
    )
}

/// Runs the validator on `sql` (`-` reads stdin). Exit code 0 when the
/// statement is accepted, 1 when rejected, 2 when stdin cannot be read.
pub fn run_validate(sql: &str) -> i32 {
    let input = if sql == "-" {
        let mut buf = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
            eprintln!("error: failed to read stdin: {e}");
            return 2;
        }
        buf
    } else {
        sql.to_string()
    };

    let (code, report) = validate_report(&input);
    println!("{report}");
    code
}

fn validate_report(sql: &str) -> (i32, String) {
    match Validator::default().validate(sql) {
        Ok(statement) => (
            0,
            format!(
                "accepted: {} on {}",
                statement.kind(),
                statement.relations().join(", ")
            ),
        ),
        Err(e) => (1, format!("rejected ({}): {e}", e.code())),
    }
}
