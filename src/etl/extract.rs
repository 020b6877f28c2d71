/// Extract Module
///
/// Receives login events from the queue and acknowledges them once processed.
use crate::models::RawMessage;
use crate::sqs::SqsClient;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The queue service rejected or failed the receive call
    #[error("couldn't receive messages from queue {queue_url}: {message}")]
    Receive { queue_url: String, message: String },
    #[error("couldn't delete message with receipt handle {receipt_handle}: {message}")]
    Delete { receipt_handle: String, message: String },
    /// A received message is missing a field every delivery must carry
    #[error("message is missing required key {key}")]
    Malformed { key: &'static str },
}

/// A queue that hands out messages and accepts acknowledgements
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait for the next batch. An empty vec means the wait elapsed.
    async fn poll(&self) -> Result<Vec<RawMessage>, SourceError>;

    /// Remove a delivered message so it is not redelivered
    async fn acknowledge(&self, receipt_handle: &str) -> Result<(), SourceError>;
}

/// SQS-backed message source
pub struct SqsSource {
    client: SqsClient,
    max_messages: i32,
    wait_seconds: i32,
}

impl SqsSource {
    pub fn new(client: SqsClient, max_messages: i32, wait_seconds: i32) -> Self {
        Self { client, max_messages, wait_seconds }
    }
}

#[async_trait]
impl MessageSource for SqsSource {
    async fn poll(&self) -> Result<Vec<RawMessage>, SourceError> {
        let messages = self.client.receive(self.max_messages, self.wait_seconds).await.map_err(|e| {
            tracing::error!("Couldn't receive messages from queue: {}", self.client.queue_url());
            e
        })?;

        messages
            .into_iter()
            .map(|m| raw_message(m.message_id, m.receipt_handle, m.body))
            .collect()
    }

    async fn acknowledge(&self, receipt_handle: &str) -> Result<(), SourceError> {
        self.client.delete(receipt_handle).await
    }
}

/// Build a `RawMessage`, rejecting deliveries without an id or receipt handle
pub fn raw_message(
    message_id: Option<String>,
    receipt_handle: Option<String>,
    body: Option<String>,
) -> Result<RawMessage, SourceError> {
    let message_id = message_id.ok_or(SourceError::Malformed { key: "MessageId" })?;
    let receipt_handle = receipt_handle.ok_or(SourceError::Malformed { key: "ReceiptHandle" })?;

    Ok(RawMessage { message_id, receipt_handle, body })
}
