/// Load Module
///
/// Handles storing normalized login records into the `user_logins` table.
use crate::db;
use crate::models::NormalizedRecord;
use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::Connection;
use std::time::Duration;

const INSERT_USER_LOGIN: &str = r#"
    INSERT INTO user_logins (user_id, device_type, masked_ip, masked_device_id, locale, app_version, create_date)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("write did not complete within {0:?}")]
    Timeout(Duration),
}

/// Downstream consumer of normalized records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Store one record. Returns `false` on failure; never errors past this point.
    async fn write(&self, record: &NormalizedRecord) -> bool;
}

/// Writes each record over its own PostgreSQL connection
pub struct PostgresWriter {
    options: PgConnectOptions,
    timeout: Duration,
}

impl PostgresWriter {
    pub fn new(options: PgConnectOptions, timeout: Duration) -> Self {
        Self { options, timeout }
    }

    /// Insert a record, bounded by the configured timeout
    pub async fn try_write(&self, record: &NormalizedRecord) -> Result<(), WriteError> {
        tokio::time::timeout(self.timeout, self.insert(record)).await.map_err(|_| WriteError::Timeout(self.timeout))?
    }

    async fn insert(&self, record: &NormalizedRecord) -> Result<(), WriteError> {
        let mut conn = db::connect(&self.options).await?;
        let mut tx = conn.begin().await?;

        sqlx::query(INSERT_USER_LOGIN)
            .bind(&record.user_id)
            .bind(&record.device_type)
            .bind(&record.masked_ip)
            .bind(&record.masked_device_id)
            .bind(&record.locale)
            .bind(record.app_version)
            .bind(record.create_date)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        conn.close().await?;

        Ok(())
    }
}

#[async_trait]
impl RecordSink for PostgresWriter {
    async fn write(&self, record: &NormalizedRecord) -> bool {
        match self.try_write(record).await {
            Ok(()) => {
                tracing::debug!("Inserted login record for message {}", record.message_id);
                true
            }
            Err(e) => {
                tracing::error!(
                    message_id = %record.message_id,
                    "Issue while writing the message {}: {}",
                    record.message_id,
                    e
                );
                false
            }
        }
    }
}
