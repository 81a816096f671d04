//! HTTP routes.
//!
//! Thin dispatch layer: handlers own the reconciliation decisions and
//! return ack values; this module maps them to status codes and JSON
//! bodies for the upstream notifiers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use prosync_billing::{verify_signature, BillingEvent, DatabaseAck, DatabaseChange};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/database", post(database_webhook))
        .route("/webhooks/stripe", post(stripe_webhook))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "prosync" }))
}

/// Application-database change notifications (Supabase webhook).
async fn database_webhook(
    State(state): State<AppState>,
    Json(change): Json<DatabaseChange>,
) -> Response {
    let ack = state.db_events.handle(change).await;
    database_response(ack)
}

fn database_response(ack: DatabaseAck) -> Response {
    match ack {
        DatabaseAck::Ignored => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        DatabaseAck::Provisioned { stripe_customer_id } => (
            StatusCode::OK,
            Json(json!({ "success": true, "stripe_customer_id": stripe_customer_id })),
        )
            .into_response(),
        DatabaseAck::Synced => (
            StatusCode::OK,
            Json(json!({ "success": true, "synced": true })),
        )
            .into_response(),
        DatabaseAck::Deleted { stripe_customer_id } => (
            StatusCode::OK,
            Json(json!({ "success": true, "deleted": true, "stripe_customer_id": stripe_customer_id })),
        )
            .into_response(),
        DatabaseAck::CleanupFailed {
            stripe_customer_id,
            warning,
        } => (
            StatusCode::OK,
            Json(json!({ "warning": warning, "stripe_customer_id": stripe_customer_id })),
        )
            .into_response(),
        DatabaseAck::Failed { error } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": error })),
        )
            .into_response(),
    }
}

/// Stripe event notifications. Raw body so the signature can be verified
/// over the exact delivered bytes.
async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if let Err(e) = verify_signature(&body, signature, &state.stripe_webhook_secret) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response();
    }

    let event: BillingEvent = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid event payload: {e}") })),
            )
                .into_response();
        }
    };

    match state.billing_events.handle(event).await {
        // Business-logic failures were already logged and swallowed by the
        // handler; only malformed payloads surface here.
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}
