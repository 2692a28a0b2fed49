// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `./pika.toml` > `~/.config/pika/pika.toml` > `/etc/pika/pika.toml`,
//! all overridden by `PIKA_*` environment variables, which are the primary
//! surface in container deployments.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PikaConfig;

/// Sections an environment key may address, e.g. `PIKA_DATABASE_HOST`.
const SECTIONS: &[&str] = &["server", "telegram", "openai", "database", "session", "agent"];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/pika/pika.toml";
pub(crate) const LOCAL_CONFIG: &str = "pika.toml";

pub(crate) fn user_config() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pika/pika.toml"))
}

/// Load configuration from the file hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pika/pika.toml`
/// 3. `~/.config/pika/pika.toml`
/// 4. `./pika.toml`
/// 5. `PIKA_*` environment variables
pub fn load_config() -> Result<PikaConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only, without files or env.
pub fn load_config_from_str(toml_content: &str) -> Result<PikaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PikaConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PikaConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PikaConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment behind [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PikaConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Maps `PIKA_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Splits only after the section name, so `PIKA_TELEGRAM_BOT_TOKEN` becomes
/// `telegram.bot_token`, not `telegram.bot.token`.
fn env_provider() -> Env {
    Env::prefixed("PIKA_").map(|key| {
        let key_str = key.as_str();
        SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string())
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PIKA_DATABASE_HOST", "db.internal");
            jail.set_env("PIKA_TELEGRAM_SECRET_TOKEN", "hook-secret");
            jail.set_env("PIKA_TELEGRAM_ALLOWED_USERS", "123,456");
            jail.set_env("PIKA_SERVER_TRUST_FORWARDED_FOR", "true");

            let config: PikaConfig = Figment::new()
                .merge(Serialized::defaults(PikaConfig::default()))
                .merge(env_provider())
                .extract()?;

            assert_eq!(config.database.host, "db.internal");
            assert_eq!(config.telegram.secret_token.as_deref(), Some("hook-secret"));
            assert_eq!(config.telegram.allowed_users, vec!["123", "456"]);
            assert!(config.server.trust_forwarded_for);
            Ok(())
        });
    }

    #[test]
    fn single_numeric_sender_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PIKA_TELEGRAM_ALLOWED_USERS", "123456789");
            let config: PikaConfig = Figment::new()
                .merge(Serialized::defaults(PikaConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.telegram.allowed_users, vec!["123456789"]);
            Ok(())
        });
    }

    #[test]
    fn local_file_is_read() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "pika.toml",
                r#"
[openai]
model = "gpt-4o"
"#,
            )?;
            let config: PikaConfig = Figment::new()
                .merge(Serialized::defaults(PikaConfig::default()))
                .merge(Toml::file(LOCAL_CONFIG))
                .extract()?;
            assert_eq!(config.openai.model, "gpt-4o");
            Ok(())
        });
    }
}
