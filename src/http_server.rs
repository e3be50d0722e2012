use crate::error::RelayResult;
use crate::queue::{QueueGateway, QueueHandle};
use crate::types::InboundCallback;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use uuid::Uuid;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Everything the ingestion handler needs, injected once at startup.
#[derive(Clone)]
pub struct ServerState {
    gateway: Arc<dyn QueueGateway>,
    queue: QueueHandle,
}

impl ServerState {
    pub fn new(gateway: Arc<dyn QueueGateway>, queue: QueueHandle) -> Self {
        Self { gateway, queue }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    event: Option<String>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/{token}", post(handle_callback))
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves.
pub async fn run<F>(listener: TcpListener, state: ServerState, shutdown: F) -> RelayResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "Ingestion server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Ingestion server stopped");
    Ok(())
}

/// Bind `addr` and serve in the background. Returns the bound address.
pub async fn start(addr: SocketAddr, state: ServerState) -> RelayResult<SocketAddr> {
    let listener = TcpListener::bind(addr).await?;
    let bound = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = run(listener, state, std::future::pending()).await {
            error!(error = %e, "Ingestion server error");
        }
    });

    Ok(bound)
}

async fn handle_callback(
    Path(token): Path<String>,
    Query(query): Query<CallbackQuery>,
    State(state): State<ServerState>,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4();

    // Any body that is not a callback-shaped JSON object is a client error,
    // whatever the content type says.
    let mut callback: InboundCallback = match serde_json::from_slice(&body) {
        Ok(c) => c,
        Err(e) => {
            warn!(%request_id, token = %token, error = %e, "Rejected malformed callback");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": e.to_string() })),
            )
                .into_response();
        }
    };

    callback.normalize(&token, query.event.as_deref());

    let message = match callback.to_queue_body() {
        Ok(m) => m,
        Err(e) => {
            error!(%request_id, token = %token, error = %e, "Failed to serialize callback");
            return internal_error();
        }
    };

    if let Err(e) = state.gateway.publish(&state.queue, &message).await {
        error!(%request_id, token = %token, error = %e, "Failed to enqueue callback");
        return internal_error();
    }

    info!(
        %request_id,
        token = %callback.token,
        event = %callback.event,
        bytes = message.len(),
        "Callback enqueued"
    );
    (StatusCode::ACCEPTED, Json(json!({}))).into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": INTERNAL_ERROR_MESSAGE })),
    )
        .into_response()
}
