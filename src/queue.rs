//! Durable queue access.
//!
//! The relay needs four queue operations: resolve a queue name once at
//! startup, publish callbacks from the ingestion path, and receive/delete
//! on the worker side. [`SqsGateway`] implements them on AWS SQS.

use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use std::fmt;
use tracing::{debug, info};

/// Addressable reference to a resolved queue (the SQS queue URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueHandle(String);

impl QueueHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message taken off the queue, not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Token needed to acknowledge (delete) this delivery of the message.
    pub receipt: String,
    pub body: String,
}

#[async_trait]
pub trait QueueGateway: Send + Sync {
    /// Look up a queue by name. Fails with [`RelayError::QueueNotFound`] or
    /// [`RelayError::Transport`].
    async fn resolve(&self, queue_name: &str) -> RelayResult<QueueHandle>;

    /// Enqueue `body` as a single message.
    ///
    /// An `Err` does not mean the message was not enqueued: the service may
    /// have stored it before the acknowledgement was lost. Callers must treat
    /// a failure as "unknown outcome". No retry happens here.
    async fn publish(&self, handle: &QueueHandle, body: &str) -> RelayResult<()>;

    /// Long-poll for up to `max_messages`, waiting at most `wait_secs`.
    async fn receive(
        &self,
        handle: &QueueHandle,
        max_messages: i32,
        wait_secs: i32,
    ) -> RelayResult<Vec<ReceivedMessage>>;

    /// Delete a received message so it is not redelivered.
    async fn acknowledge(&self, handle: &QueueHandle, receipt: &str) -> RelayResult<()>;
}

/// [`QueueGateway`] backed by AWS SQS.
///
/// The SDK client is cheap to clone and safe for concurrent use; build one
/// per process.
#[derive(Clone)]
pub struct SqsGateway {
    client: aws_sdk_sqs::Client,
}

impl SqsGateway {
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }

    /// Load credentials for `profile` (or the default chain) in `region`.
    pub async fn connect(region: &str, profile: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()));
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;
        info!(region, profile = profile.unwrap_or("default"), "SQS client configured");
        Self::new(aws_sdk_sqs::Client::new(&config))
    }
}

#[async_trait]
impl QueueGateway for SqsGateway {
    async fn resolve(&self, queue_name: &str) -> RelayResult<QueueHandle> {
        let output = match self.client.get_queue_url().queue_name(queue_name).send().await {
            Ok(output) => output,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_queue_does_not_exist())
                {
                    return Err(RelayError::QueueNotFound(queue_name.to_string()));
                }
                return Err(RelayError::Transport(DisplayErrorContext(&err).to_string()));
            }
        };

        let url = output
            .queue_url()
            .ok_or_else(|| RelayError::QueueNotFound(queue_name.to_string()))?;
        Ok(QueueHandle::new(url))
    }

    async fn publish(&self, handle: &QueueHandle, body: &str) -> RelayResult<()> {
        let output = self
            .client
            .send_message()
            .queue_url(handle.as_str())
            .message_body(body)
            .send()
            .await
            .map_err(|e| RelayError::Publish(DisplayErrorContext(&e).to_string()))?;

        debug!(message_id = output.message_id().unwrap_or(""), "Message published");
        Ok(())
    }

    async fn receive(
        &self,
        handle: &QueueHandle,
        max_messages: i32,
        wait_secs: i32,
    ) -> RelayResult<Vec<ReceivedMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(handle.as_str())
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_secs)
            .send()
            .await
            .map_err(|e| RelayError::Receive(DisplayErrorContext(&e).to_string()))?;

        // A message without a receipt handle cannot be acknowledged, skip it.
        Ok(output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                let receipt = m.receipt_handle()?.to_string();
                let body = m.body().unwrap_or_default().to_string();
                Some(ReceivedMessage { receipt, body })
            })
            .collect())
    }

    async fn acknowledge(&self, handle: &QueueHandle, receipt: &str) -> RelayResult<()> {
        self.client
            .delete_message()
            .queue_url(handle.as_str())
            .receipt_handle(receipt)
            .send()
            .await
            .map_err(|e| RelayError::Acknowledge(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
