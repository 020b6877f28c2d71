/// CLI Module
///
/// Command-line interface configuration using clap.
use crate::config::PipelineSettings;
use crate::models::AckMode;
use clap::Parser;
use std::path::PathBuf;

/// Longest long-poll wait SQS accepts
const MAX_WAIT_SECONDS: i32 = 20;

/// Largest receive batch SQS accepts
const MAX_BATCH: i32 = 10;

/// Login Ingest - SQS to PostgreSQL
///
/// Poll login events from a queue, mask PII and store them in PostgreSQL
#[derive(Parser, Debug)]
#[command(name = "login-ingest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the INI configuration file
    #[arg(short = 'c', long, value_name = "FILE", default_value = "config.ini")]
    pub config: PathBuf,

    /// Long-poll wait in seconds (overrides [pipeline] wait_seconds)
    #[arg(short = 'w', long, value_name = "SECONDS")]
    pub wait_seconds: Option<i32>,

    /// Messages requested per poll (overrides [pipeline] max_messages)
    #[arg(short = 'm', long, value_name = "COUNT")]
    pub max_messages: Option<i32>,

    /// Upper bound on a single database write in seconds
    #[arg(long, value_name = "SECONDS")]
    pub write_timeout: Option<u64>,

    /// When to delete a message relative to the database write
    #[arg(long, value_enum)]
    pub ack_mode: Option<AckMode>,

    /// Run a single poll cycle and exit
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    /// Apply command-line overrides on top of file settings
    pub fn merge(&self, mut settings: PipelineSettings) -> PipelineSettings {
        if let Some(wait) = self.wait_seconds {
            settings.wait_seconds = wait;
        }
        if let Some(max) = self.max_messages {
            settings.max_messages = max;
        }
        if let Some(timeout) = self.write_timeout {
            settings.write_timeout_secs = timeout;
        }
        if let Some(mode) = self.ack_mode {
            settings.ack_mode = mode;
        }
        settings
    }

    /// Validate the effective pipeline settings
    pub fn validate(settings: &PipelineSettings) -> anyhow::Result<()> {
        if !(0..=MAX_WAIT_SECONDS).contains(&settings.wait_seconds) {
            anyhow::bail!("Wait seconds ({}) must be between 0 and {}", settings.wait_seconds, MAX_WAIT_SECONDS);
        }

        if !(1..=MAX_BATCH).contains(&settings.max_messages) {
            anyhow::bail!("Max messages ({}) must be between 1 and {}", settings.max_messages, MAX_BATCH);
        }

        if settings.write_timeout_secs == 0 {
            anyhow::bail!("Write timeout must be greater than 0");
        }

        Ok(())
    }
}
