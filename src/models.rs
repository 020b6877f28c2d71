/// Data Models Module
///
/// This module defines the core data structures used throughout the application.
/// A `RawMessage` is what the queue hands us; a `NormalizedRecord` is what ends up
/// in the `user_logins` table.
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

/// A message as received from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message_id: String,
    /// One-time token required to delete this delivery
    pub receipt_handle: String,
    /// JSON text of the login event, if the message carried one
    pub body: Option<String>,
}

/// A login event ready for storage
///
/// Known columns are typed; anything else found in the body is kept in `extra`
/// so new producer fields are not silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub message_id: String,
    pub user_id: Option<String>,
    pub app_version: Option<i32>,
    pub device_type: Option<String>,
    pub masked_ip: Option<String>,
    pub locale: Option<String>,
    pub masked_device_id: Option<String>,
    pub create_date: NaiveDate,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of transforming a single message
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    Record(NormalizedRecord),
    /// The message had no body; it is acknowledged but nothing is stored
    NoBody,
}

/// Ordering between the queue acknowledgement and the database write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Delete from the queue first, then write. A failed write loses the record.
    #[default]
    BeforeWrite,
    /// Write first and delete only on success. A failed write is redelivered.
    AfterWrite,
}

impl AckMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::BeforeWrite => "before-write",
            Self::AfterWrite => "after-write",
        }
    }
}
