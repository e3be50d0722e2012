//! Error types for the relay.

use thiserror::Error;

/// Relay error type.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The named queue does not exist.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// The queue service could not be reached or answered with an error.
    #[error("Queue transport error: {0}")]
    Transport(String),

    /// `SendMessage` failed. The message may still have been enqueued if the
    /// acknowledgement was lost in transit, so the outcome is unknown.
    #[error("Publish failed (outcome unknown): {0}")]
    Publish(String),

    /// Long-poll receive failed
    #[error("Receive failed: {0}")]
    Receive(String),

    /// Deleting a received message failed
    #[error("Acknowledge failed: {0}")]
    Acknowledge(String),

    /// JSON encode/decode error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (listener bind, file reads)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Subscriber directory could not be loaded
    #[error("Subscriber directory error: {0}")]
    Directory(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Outbound HTTP client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
