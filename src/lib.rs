//! webhook-relay: durable webhook ingestion and subscriber fan-out.
//!
//! ```text
//! POST /{token} -> http_server -> QueueGateway::publish -> SQS
//!                                                          |
//! subscribers <- DeliveryClient <- SubscriberDirectory <- Worker
//! ```
//!
//! The ingestion side answers 202 as soon as the callback is enqueued. The
//! worker side delivers each message once to every subscriber of its token
//! and deletes it from the queue afterwards.

pub mod config;
pub mod delivery;
pub mod error;
pub mod http_server;
pub mod queue;
pub mod signing;
pub mod subscribers;
pub mod telemetry;
pub mod types;
pub mod worker;

pub use delivery::{DeliveryClient, DeliveryConfig};
pub use error::{RelayError, RelayResult};
pub use http_server::ServerState;
pub use queue::{QueueGateway, QueueHandle, ReceivedMessage, SqsGateway};
pub use subscribers::{Subscriber, SubscriberDirectory};
pub use types::{DeliveryOutcome, DeliveryStatus, DeliveryTarget, InboundCallback};
pub use worker::{MessageReport, Worker, WorkerConfig};
