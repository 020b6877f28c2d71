/// SQS Client Module
///
/// This module handles all interactions with the queue service.
/// It wraps the AWS SQS client and provides convenient methods for receiving
/// and deleting messages on a single queue URL.
use aws_sdk_sqs::{
    config::{BehaviorVersion, Credentials, Region},
    error::DisplayErrorContext,
    types::Message,
    Client,
};

use crate::config::SqsSettings;
use crate::etl::extract::SourceError;

pub struct SqsClient {
    client: Client,
    queue_url: String,
}

impl SqsClient {
    /// Create a new SQS client for the configured queue
    ///
    /// Static credentials from the config file take precedence; when the access
    /// key is left empty the default AWS credential chain is used instead.
    pub async fn new(settings: &SqsSettings) -> Self {
        let region = Region::new(settings.region_name.clone());
        let mut builder = aws_sdk_sqs::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(region.clone())
            .endpoint_url(settings.endpoint.trim_end_matches('/'));

        if settings.aws_access_key_id.is_empty() {
            let shared = aws_config::defaults(BehaviorVersion::latest()).region(region).load().await;
            if let Some(provider) = shared.credentials_provider() {
                builder = builder.credentials_provider(provider);
            }
        } else {
            let credentials = Credentials::new(
                settings.aws_access_key_id.clone(),
                settings.aws_secret_access_key.clone(),
                None,
                None,
                "login-ingest",
            );
            builder = builder.credentials_provider(credentials);
        }

        Self { client: Client::from_conf(builder.build()), queue_url: settings.queue_url() }
    }

    /// Get the queue URL this client polls
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Long-poll the queue for up to `max_messages`
    pub async fn receive(&self, max_messages: i32, wait_seconds: i32) -> Result<Vec<Message>, SourceError> {
        tracing::debug!("Polling {} (max {}, wait {}s)", self.queue_url, max_messages, wait_seconds);

        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|e| SourceError::Receive {
                queue_url: self.queue_url.clone(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        Ok(output.messages.unwrap_or_default())
    }

    /// Delete a message by receipt handle
    pub async fn delete(&self, receipt_handle: &str) -> Result<(), SourceError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| SourceError::Delete {
                receipt_handle: receipt_handle.to_string(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        Ok(())
    }
}
