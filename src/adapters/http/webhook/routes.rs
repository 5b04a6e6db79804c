//! Axum router configuration for the webhook and operator endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    audit_subscriptions, get_entitlement, get_webhook_stats, health, receive_webhook,
    retry_failed_event, WebhookAppState,
};

/// Operator API, mounted under `/api`.
///
/// # Routes
/// - `GET /entitlements/:customer_id` - Current entitlement for a customer
/// - `GET /webhooks/stats` - Buffer and idempotency counters
/// - `POST /webhooks/failed/:event_id/retry` - Requeue a frozen event
/// - `GET /subscriptions/audit` - Cross-check billing and entitlement documents
pub fn api_routes() -> Router<WebhookAppState> {
    Router::new()
        .route("/entitlements/:customer_id", get(get_entitlement))
        .route("/webhooks/stats", get(get_webhook_stats))
        .route("/webhooks/failed/:event_id/retry", post(retry_failed_event))
        .route("/subscriptions/audit", get(audit_subscriptions))
}

/// Provider-facing routes. No auth; deliveries are verified by signature.
///
/// # Routes
/// - `POST /webhooks/:provider` - Receive a webhook
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/webhooks/:provider", post(receive_webhook))
}

/// Complete router: health, webhook receiver and operator API.
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new()
        .route("/health", get(health))
        .merge(webhook_routes())
        .nest("/api", api_routes())
}
