//! Consumer loop: queue -> subscribers.
//!
//! Each received message is decoded, resolved against the subscriber
//! directory, fanned out once, and then deleted from the queue. Delivery
//! failures are logged and reported, never retried.

use crate::delivery::DeliveryClient;
use crate::error::RelayResult;
use crate::queue::{QueueGateway, QueueHandle, ReceivedMessage};
use crate::subscribers::SubscriberDirectory;
use crate::types::{DeliveryOutcome, InboundCallback};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Messages per receive call (SQS allows 1-10).
    pub batch_size: i32,
    /// Long-poll wait in seconds (SQS allows 0-20).
    pub wait_secs: i32,
    /// Pause after a failed receive before polling again.
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            wait_secs: 20,
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// What happened to one received message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageReport {
    /// Body was not a callback; dropped.
    Undecodable,
    /// Fanned out; one outcome per subscriber (empty when nobody subscribed).
    Dispatched {
        token: String,
        event: String,
        outcomes: Vec<DeliveryOutcome>,
    },
}

pub struct Worker {
    gateway: Arc<dyn QueueGateway>,
    queue: QueueHandle,
    directory: Arc<SubscriberDirectory>,
    client: DeliveryClient,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        gateway: Arc<dyn QueueGateway>,
        queue: QueueHandle,
        directory: Arc<SubscriberDirectory>,
        client: DeliveryClient,
        config: WorkerConfig,
    ) -> Self {
        Self {
            gateway,
            queue,
            directory,
            client,
            config,
        }
    }

    /// Poll forever. Queue errors are logged and retried after a pause.
    pub async fn run(&self) {
        info!(
            queue = %self.queue,
            batch_size = self.config.batch_size,
            wait_secs = self.config.wait_secs,
            tokens = self.directory.token_count(),
            subscribers = self.directory.subscriber_count(),
            "Starting delivery worker"
        );

        loop {
            match self.process_batch().await {
                Ok(0) => debug!("No messages available, continuing to poll..."),
                Ok(n) => debug!(messages = n, "Batch processed"),
                Err(e) => {
                    error!(error = %e, "Error receiving messages");
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }
        }
    }

    /// Receive one batch and process every message in it.
    /// Returns how many messages were received.
    pub async fn process_batch(&self) -> RelayResult<usize> {
        let messages = self
            .gateway
            .receive(&self.queue, self.config.batch_size, self.config.wait_secs)
            .await?;
        let count = messages.len();

        for message in messages {
            self.process_message(&message).await;
        }

        Ok(count)
    }

    /// Decode, fan out, and acknowledge a single message.
    ///
    /// The message is acknowledged whatever the delivery outcomes are; an
    /// acknowledge failure only means SQS will hand it out again.
    pub async fn process_message(&self, message: &ReceivedMessage) -> MessageReport {
        let report = self.dispatch(message).await;

        if let Err(e) = self.gateway.acknowledge(&self.queue, &message.receipt).await {
            warn!(error = %e, "Failed to acknowledge message, it will be redelivered");
        }

        report
    }

    async fn dispatch(&self, message: &ReceivedMessage) -> MessageReport {
        let callback = match InboundCallback::from_queue_body(&message.body) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, bytes = message.body.len(), "Dropping undecodable message");
                return MessageReport::Undecodable;
            }
        };

        let targets = match self.directory.targets_for(&callback) {
            Ok(t) => t,
            Err(e) => {
                warn!(token = %callback.token, error = %e, "Failed to build delivery targets");
                Vec::new()
            }
        };

        if targets.is_empty() {
            debug!(token = %callback.token, event = %callback.event, "No subscribers for token");
        }

        let outcomes = self.client.deliver(&targets).await;
        let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
        let failed = outcomes.len() - delivered;

        if failed > 0 {
            warn!(
                token = %callback.token,
                event = %callback.event,
                delivered,
                failed,
                "Fan-out completed with failures"
            );
        } else if !outcomes.is_empty() {
            info!(
                token = %callback.token,
                event = %callback.event,
                delivered,
                "Fan-out completed"
            );
        }

        MessageReport::Dispatched {
            token: callback.token,
            event: callback.event,
            outcomes,
        }
    }
}
