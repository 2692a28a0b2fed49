// SPDX-FileCopyrightText: 2026 Pika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Pika sales gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Top-level Pika configuration.
///
/// Loaded from TOML files and `PIKA_*` environment variables. Every section
/// is optional; secrets have no default and are checked by validation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PikaConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat transport: bot credentials and the identity/origin allow-lists.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Statement translator settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Relational store connection.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Pending-operation store.
    #[serde(default)]
    pub session: SessionConfig,

    /// Process-level settings.
    #[serde(default)]
    pub agent: AgentConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Take the source address from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a reverse proxy that overwrites these headers.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            trust_forwarded_for: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// What an unauthorized sender gets back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefusalPolicy {
    /// No reply at all.
    Silent,
    /// A fixed refusal that does not say why.
    #[default]
    Generic,
}

/// Telegram bot integration configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token used for outbound replies.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Shared secret expected in `X-Telegram-Bot-Api-Secret-Token`.
    #[serde(default)]
    pub secret_token: Option<String>,

    /// Numeric Telegram user ids allowed to use the bot. Empty denies everyone.
    #[serde(default, deserialize_with = "string_or_list")]
    pub allowed_users: Vec<String>,

    /// CIDR ranges inbound calls must originate from.
    #[serde(
        default = "default_trusted_networks",
        deserialize_with = "string_or_list"
    )]
    pub trusted_networks: Vec<String>,

    #[serde(default)]
    pub refusal_policy: RefusalPolicy,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            secret_token: None,
            allowed_users: Vec::new(),
            trusted_networks: default_trusted_networks(),
            refusal_policy: RefusalPolicy::default(),
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("secret_token", &self.secret_token.as_ref().map(|_| "[REDACTED]"))
            .field("allowed_users", &self.allowed_users)
            .field("trusted_networks", &self.trusted_networks)
            .field("refusal_policy", &self.refusal_policy)
            .finish()
    }
}

/// Telegram's published webhook source ranges.
fn default_trusted_networks() -> Vec<String> {
    vec!["149.154.160.0/20".to_string(), "91.108.4.0/22".to_string()]
}

/// OpenAI chat completions configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. Required by `serve`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-attempt timeout in seconds.
    #[serde(default = "default_openai_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_openai_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.1
}

/// Which executor backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    /// Embedded SQLite file with the sales schema migrated in.
    Sqlite,
}

/// Relational store configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseBackend,

    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_user")]
    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_db_name")]
    pub name: String,

    /// Database file for the `sqlite` backend.
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,

    /// Upper bound on one statement, in seconds.
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,

    /// How many rows of a read result are kept for the reply.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: None,
            name: default_db_name(),
            sqlite_path: default_sqlite_path(),
            statement_timeout_secs: default_statement_timeout_secs(),
            sample_rows: default_sample_rows(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("name", &self.name)
            .field("sqlite_path", &self.sqlite_path)
            .field("statement_timeout_secs", &self.statement_timeout_secs)
            .field("sample_rows", &self.sample_rows)
            .finish()
    }
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_name() -> String {
    "pika".to_string()
}

fn default_sqlite_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("pika").join("pika.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("pika.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_statement_timeout_secs() -> u64 {
    10
}

fn default_sample_rows() -> usize {
    10
}

/// Pending-operation store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Idle pending operations older than this are treated as gone.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Ask for a yes/no before running an INSERT or UPDATE.
    #[serde(default = "default_confirm_writes")]
    pub confirm_writes: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            confirm_writes: default_confirm_writes(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    900
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_confirm_writes() -> bool {
    true
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Accepts a TOML array or a comma-separated string, the form lists take in
/// environment variables (`PIKA_TELEGRAM_ALLOWED_USERS=123,456`).
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        String(String),
        Number(i64),
        List(Vec<StringOrNumber>),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    let items = match StringOrList::deserialize(deserializer)? {
        StringOrList::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        StringOrList::Number(n) => vec![n.to_string()],
        StringOrList::List(items) => items
            .into_iter()
            .map(|item| match item {
                StringOrNumber::String(s) => s.trim().to_string(),
                StringOrNumber::Number(n) => n.to_string(),
            })
            .collect(),
    };
    Ok(items)
}
