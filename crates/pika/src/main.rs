// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pika - natural-language sales bookkeeping over Telegram.
//!
//! This is the binary entry point for the Pika sales gateway.

mod check;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pika_config::PikaConfig;

/// Pika - natural-language sales bookkeeping over Telegram.
#[derive(Parser, Debug)]
#[command(name = "pika", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook server (the default).
    Serve,
    /// Load and validate the configuration, then print a summary.
    CheckConfig,
    /// Run the statement validator on one SQL statement (`-` reads stdin).
    Validate {
        /// The candidate statement.
        sql: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let mut config = load_config(cli.config.as_deref());
            serve::apply_env_fallbacks(&mut config);
            if let Err(errors) = pika_config::validate_for_serve(&config) {
                pika_config::render_errors(&errors);
                std::process::exit(1);
            }
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Commands::CheckConfig => {
            let mut config = load_config(cli.config.as_deref());
            serve::apply_env_fallbacks(&mut config);
            std::process::exit(check::run_check_config(&config));
        }
        Commands::Validate { sql } => {
            std::process::exit(check::run_validate(&sql));
        }
    }
}

/// Loads configuration, rendering diagnostics and exiting on failure.
fn load_config(path: Option<&std::path::Path>) -> PikaConfig {
    let result = match path {
        Some(path) => pika_config::load_and_validate_path(path),
        None => pika_config::load_and_validate(),
    };
    match result {
        Ok(config) => config,
        Err(errors) => {
            pika_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["pika"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn validate_takes_the_statement() {
        let cli = Cli::try_parse_from(["pika", "validate", "SELECT * FROM clients"]).unwrap();
        match cli.command {
            Some(Commands::Validate { sql }) => assert_eq!(sql, "SELECT * FROM clients"),
            other => panic!("expected validate, got {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::try_parse_from(["pika", "check-config", "--config", "/tmp/pika.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/pika.toml")));
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
    }
}
