//! Shared harness: an in-memory queue and local subscriber servers.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::Router;
use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use webhook_relay::{DeliveryTarget, QueueGateway, QueueHandle, ReceivedMessage, RelayError, RelayResult};

pub const QUEUE_NAME: &str = "new_request_dev";
pub const QUEUE_URL: &str = "https://sqs.us-east-1.amazonaws.com/000000000000/new_request_dev";

/// In-memory [`QueueGateway`] that records every call.
#[derive(Default)]
pub struct RecordingGateway {
    pub published: Mutex<Vec<String>>,
    pub publish_attempts: AtomicUsize,
    pub fail_publish: AtomicBool,
    pub inbox: Mutex<VecDeque<ReceivedMessage>>,
    pub acknowledged: Mutex<Vec<String>>,
    pub fail_receive: AtomicBool,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let gateway = Self::default();
        gateway.fail_publish.store(true, Ordering::SeqCst);
        Arc::new(gateway)
    }

    pub fn handle() -> QueueHandle {
        QueueHandle::new(QUEUE_URL)
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    pub fn enqueue(&self, receipt: &str, body: &str) {
        self.inbox.lock().unwrap().push_back(ReceivedMessage {
            receipt: receipt.to_string(),
            body: body.to_string(),
        });
    }

    pub fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueGateway for RecordingGateway {
    async fn resolve(&self, queue_name: &str) -> RelayResult<QueueHandle> {
        if queue_name == QUEUE_NAME {
            Ok(Self::handle())
        } else {
            Err(RelayError::QueueNotFound(queue_name.to_string()))
        }
    }

    async fn publish(&self, _handle: &QueueHandle, body: &str) -> RelayResult<()> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(RelayError::Publish("connection reset by peer".into()));
        }
        self.published.lock().unwrap().push(body.to_string());
        Ok(())
    }

    async fn receive(
        &self,
        _handle: &QueueHandle,
        max_messages: i32,
        _wait_secs: i32,
    ) -> RelayResult<Vec<ReceivedMessage>> {
        if self.fail_receive.load(Ordering::SeqCst) {
            return Err(RelayError::Receive("throttled".into()));
        }
        let batch: Vec<ReceivedMessage> = {
            let mut inbox = self.inbox.lock().unwrap();
            let n = (max_messages as usize).min(inbox.len());
            inbox.drain(..n).collect()
        };
        // Stand-in for the long-poll wait.
        if batch.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(batch)
    }

    async fn acknowledge(&self, _handle: &QueueHandle, receipt: &str) -> RelayResult<()> {
        self.acknowledged.lock().unwrap().push(receipt.to_string());
        Ok(())
    }
}

/// A request as seen by a subscriber.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CapturedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn header_count(&self, name: &str) -> usize {
        self.headers.get_all(name).iter().count()
    }
}

#[derive(Clone)]
struct SubscriberState {
    status: StatusCode,
    delay: Duration,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// A local endpoint that records what it receives.
pub struct TestSubscriber {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl TestSubscriber {
    pub async fn start() -> Self {
        Self::with_behavior(StatusCode::OK, Duration::ZERO).await
    }

    pub async fn with_status(status: StatusCode) -> Self {
        Self::with_behavior(status, Duration::ZERO).await
    }

    pub async fn with_delay(delay: Duration) -> Self {
        Self::with_behavior(StatusCode::OK, delay).await
    }

    async fn with_behavior(status: StatusCode, delay: Duration) -> Self {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let state = SubscriberState {
            status,
            delay,
            captured: captured.clone(),
        };

        let app = Router::new().fallback(capture).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, captured }
    }

    pub fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().unwrap().clone()
    }
}

async fn capture(
    State(state): State<SubscriberState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    state.captured.lock().unwrap().push(CapturedRequest {
        method,
        headers,
        body,
    });
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.status
}

/// URL of a port that refuses connections.
pub async fn refused_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/hook")
}

pub fn target(url: &str, data: serde_json::Value) -> DeliveryTarget {
    DeliveryTarget {
        url: url.to_string(),
        method: "POST".into(),
        headers: BTreeMap::new(),
        data,
        secret: None,
    }
}
