//! Webhook receiver for Telegram updates.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tower_http::trace::TraceLayer;

use crate::channels::EventStream;
use crate::channels::channel::InboundEvent;
use crate::channels::telegram::parse_update;

/// Header Telegram sets to the `secret_token` given to `setWebhook`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

pub const WEBHOOK_PATH: &str = "/telegram/webhook";

/// Updates buffered ahead of the dispatcher before deliveries get 503.
const WEBHOOK_QUEUE_CAPACITY: usize = 1024;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    tx: mpsc::Sender<InboundEvent>,
    secret: Option<String>,
}

/// Build the webhook router and the stream of events it receives.
pub fn webhook_routes(secret: Option<String>) -> (Router, EventStream) {
    webhook_routes_with_capacity(secret, WEBHOOK_QUEUE_CAPACITY)
}

fn webhook_routes_with_capacity(secret: Option<String>, capacity: usize) -> (Router, EventStream) {
    let (tx, rx) = mpsc::channel(capacity);
    let state = WebhookState {
        tx,
        secret: secret.filter(|s| !s.is_empty()),
    };

    let router = Router::new()
        .route(WEBHOOK_PATH, post(receive_update))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    });

    (router, Box::pin(stream))
}

/// POST /telegram/webhook
///
/// Rejects deliveries without the configured secret. Every accepted update
/// gets a 200, even if it carries nothing we handle, so Telegram does not
/// redeliver it.
async fn receive_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(expected) = &state.secret {
        let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            tracing::warn!("Webhook delivery with bad secret token rejected");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: Value = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook body is not JSON, ignoring");
            return StatusCode::OK;
        }
    };

    match parse_update(&update) {
        Some(event) => {
            match state.tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Webhook queue full, asking Telegram to retry");
                    return StatusCode::SERVICE_UNAVAILABLE;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::error!("Dispatcher gone, webhook update lost");
                    return StatusCode::SERVICE_UNAVAILABLE;
                }
            }
        }
        None => {
            tracing::debug!(
                update_id = update.get("update_id").and_then(|v| v.as_i64()),
                "Ignoring unsupported update"
            );
        }
    }

    StatusCode::OK
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}
