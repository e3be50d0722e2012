use crate::error::RelayResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A callback accepted at `POST /{token}`.
///
/// The serialized form is also the queue message body; nothing else is added
/// around it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InboundCallback {
    #[serde(default)]
    pub event: String,
    /// Always replaced by the path segment before enqueueing.
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl InboundCallback {
    /// Route the callback to `token` and fill a missing event from the query
    /// string. A body-supplied token never survives this.
    pub fn normalize(&mut self, token: &str, query_event: Option<&str>) {
        self.token = token.to_string();
        if self.event.is_empty() {
            self.event = query_event.unwrap_or_default().to_string();
        }
    }

    pub fn to_queue_body(&self) -> RelayResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_queue_body(body: &str) -> RelayResult<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// One subscriber's delivery instructions for a single attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryTarget {
    pub url: String,
    pub method: String,
    /// Applied in key order; `Content-Type` is overwritten afterwards.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub data: Value,
    /// HMAC key used to sign the body, if the subscriber asked for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Subscriber answered 2xx.
    Delivered { code: u16 },
    /// Subscriber answered, but not with 2xx.
    Rejected { code: u16 },
    /// No response: bad request shape, transport error or timeout.
    Failed { reason: String },
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub url: String,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self.status, DeliveryStatus::Delivered { .. })
    }
}
