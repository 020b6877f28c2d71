/// Transform Module
///
/// Turns a raw login event into a `NormalizedRecord`: PII fields are masked,
/// the app version is reduced to its major number and the ingestion date is stamped.
use crate::models::{NormalizedRecord, RawMessage, Transformed};
use chrono::{Local, NaiveDate};
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};

// Body keys with special handling
const IP: &str = "ip";
const DEVICE_ID: &str = "device_id";
const APP_VERSION: &str = "app_version";
const USER_ID: &str = "user_id";
const DEVICE_TYPE: &str = "device_type";
const LOCALE: &str = "locale";
const CREATE_DATE: &str = "create_date";

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("body of message {message_id} is not a JSON object: {reason}")]
    InvalidBody { message_id: String, reason: String },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("app version {0:?} is alphanumeric or does not follow dot notation")]
pub struct VersionError(pub String);

/// Transform a message, stamping it with today's local date
pub fn transform(message: &RawMessage) -> Result<Transformed, TransformError> {
    transform_at(message, Local::now().date_naive())
}

/// Transform a message as if processed on `today`
pub fn transform_at(message: &RawMessage, today: NaiveDate) -> Result<Transformed, TransformError> {
    let Some(body) = message.body.as_deref() else {
        return Ok(Transformed::NoBody);
    };

    let fields: Map<String, Value> = serde_json::from_str(body).map_err(|e| TransformError::InvalidBody {
        message_id: message.message_id.clone(),
        reason: e.to_string(),
    })?;

    let mut record = NormalizedRecord {
        message_id: message.message_id.clone(),
        user_id: None,
        app_version: None,
        device_type: None,
        masked_ip: None,
        locale: None,
        masked_device_id: None,
        create_date: today,
        extra: Map::new(),
    };

    for (key, value) in fields {
        match key.as_str() {
            IP => record.masked_ip = mask(&value),
            DEVICE_ID => record.masked_device_id = mask(&value),
            APP_VERSION => match parse_app_version(&value) {
                Ok(version) => record.app_version = version,
                Err(e) => tracing::warn!(message_id = %message.message_id, "{}", e),
            },
            USER_ID => record.user_id = scalar_text(&value),
            DEVICE_TYPE => record.device_type = scalar_text(&value),
            LOCALE => record.locale = scalar_text(&value),
            CREATE_DATE => {}
            _ => {
                record.extra.insert(key, value);
            }
        }
    }

    Ok(Transformed::Record(record))
}

/// One-way mask for PII: SHA-512 of the value's text, as lower-case hex
///
/// `null` stays `None`; absence is never hashed. Non-string scalars hash their
/// JSON text (`true`, `1.5`), so they will not match masks produced from
/// Python-style renderings such as `True`.
pub fn mask(value: &Value) -> Option<String> {
    let text = scalar_text(value)?;
    Some(hex::encode(Sha512::digest(text.as_bytes())))
}

/// Major version from a dotted version string, e.g. `"2.13.0"` -> `2`
pub fn parse_app_version(value: &Value) -> Result<Option<i32>, VersionError> {
    let Some(text) = scalar_text(value) else {
        return Ok(None);
    };

    let major = text.split('.').next().unwrap_or_default().trim();
    major.parse::<i32>().map(Some).map_err(|_| VersionError(text))
}

/// String contents for JSON strings, JSON text for other values, `None` for null
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
