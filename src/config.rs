/// Configuration Module
///
/// Loads queue and database settings from an INI file (sections `[SQS]` and
/// `[postgres]`, plus an optional `[pipeline]`), with `LOGIN_INGEST__`-prefixed
/// environment variables layered on top. The file is read once at startup.
use crate::models::AckMode;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default long-poll wait in seconds
pub const DEFAULT_WAIT_SECONDS: i32 = 20;

/// Default number of messages requested per poll
pub const DEFAULT_MAX_MESSAGES: i32 = 1;

/// Default upper bound on a single database write
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 30;

/// Environment variable prefix for overrides, e.g. `LOGIN_INGEST__POSTGRES__HOST`
pub const ENV_PREFIX: &str = "LOGIN_INGEST";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration from {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: config::ConfigError,
    },
}

/// Top-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(alias = "SQS")]
    pub sqs: SqsSettings,
    pub postgres: PostgresSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Queue connection parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SqsSettings {
    pub region_name: String,
    /// Base endpoint; the queue URL is `{endpoint}/{queue_name}`
    pub endpoint: String,
    pub queue_name: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
}

impl SqsSettings {
    pub fn queue_url(&self) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), self.queue_name)
    }
}

/// Database connection parameters
#[derive(Debug, Clone, Deserialize)]
pub struct PostgresSettings {
    pub database: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

/// Polling and write behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub wait_seconds: i32,
    pub max_messages: i32,
    pub write_timeout_secs: u64,
    pub ack_mode: AckMode,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            wait_seconds: DEFAULT_WAIT_SECONDS,
            max_messages: DEFAULT_MAX_MESSAGES,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            ack_mode: AckMode::default(),
        }
    }
}

impl PipelineSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Settings {
    /// Load settings from an INI file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();

        config::Config::builder()
            .add_source(config::File::new(&display, config::FileFormat::Ini))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).prefix_separator("__").separator("__"))
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .map_err(|source| ConfigError::Load { path: display, source })
    }
}
