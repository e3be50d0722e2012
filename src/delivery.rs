//! Outbound fan-out to subscriber endpoints.
//!
//! Every target gets exactly one attempt. A failing subscriber never affects
//! its siblings; the caller gets one [`DeliveryOutcome`] per target, in the
//! order the targets were given.

use crate::error::RelayResult;
use crate::signing::{sign_payload, SIGNATURE_HEADER};
use crate::types::{DeliveryOutcome, DeliveryStatus, DeliveryTarget};
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Deadline for a single request, connect included.
    pub timeout: Duration,
    /// Concurrent requests per `deliver` call.
    pub max_in_flight: usize,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_in_flight: 16,
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Long-lived outbound client. Clone it rather than building a new one.
#[derive(Clone)]
pub struct DeliveryClient {
    client: reqwest::Client,
    max_in_flight: usize,
}

impl DeliveryClient {
    pub fn new(config: &DeliveryConfig) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .build()?;

        Ok(Self {
            client,
            max_in_flight: config.max_in_flight.max(1),
        })
    }

    /// Deliver to every target, at most `max_in_flight` at a time.
    pub async fn deliver(&self, targets: &[DeliveryTarget]) -> Vec<DeliveryOutcome> {
        let pending: Vec<_> = targets.iter().map(|target| self.deliver_one(target)).collect();
        stream::iter(pending)
            .buffered(self.max_in_flight)
            .collect()
            .await
    }

    async fn deliver_one(&self, target: &DeliveryTarget) -> DeliveryOutcome {
        let status = match self.send(target).await {
            Ok(code) if (200..300).contains(&code) => {
                debug!(url = %target.url, code, "Delivered");
                DeliveryStatus::Delivered { code }
            }
            Ok(code) => {
                warn!(url = %target.url, code, "Subscriber rejected delivery");
                DeliveryStatus::Rejected { code }
            }
            Err(reason) => {
                warn!(url = %target.url, reason = %reason, "Delivery failed");
                DeliveryStatus::Failed { reason }
            }
        };

        DeliveryOutcome {
            url: target.url.clone(),
            status,
        }
    }

    /// Returns the response status code, or why no response was obtained.
    async fn send(&self, target: &DeliveryTarget) -> Result<u16, String> {
        let body = serde_json::to_vec(&target.data)
            .map_err(|e| format!("failed to serialize body: {e}"))?;

        let method = Method::from_bytes(target.method.as_bytes())
            .map_err(|_| format!("invalid method: {}", target.method))?;

        let mut headers = build_headers(target)?;
        if let Some(secret) = &target.secret {
            let signature = HeaderValue::from_str(&sign_payload(secret, &body))
                .map_err(|e| format!("invalid signature header: {e}"))?;
            headers.insert(HeaderName::from_static(SIGNATURE_HEADER), signature);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self
            .client
            .request(method, &target.url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("timed out: {e}")
                } else {
                    format!("request failed: {e}")
                }
            })?;

        Ok(response.status().as_u16())
    }
}

/// Caller headers in key order. `insert` replaces, so a later key with the
/// same case-insensitive name wins.
fn build_headers(target: &DeliveryTarget) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::with_capacity(target.headers.len() + 2);
    for (name, value) in &target.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| format!("invalid header name: {name}"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| format!("invalid value for header {name}"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
