//! HTTP handlers for the webhook receiver and the operator endpoints.
//!
//! These handlers connect Axum routes to the webhook processor and the
//! application query/command handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::handlers::{
    AuditSubscriptionsHandler, GetEntitlementHandler, GetEntitlementQuery, GetWebhookStatsHandler,
    RetryFailedEventCommand, RetryFailedEventHandler,
};
use crate::application::{
    ConnectionGuardian, DurableBuffer, IdempotencyStore, ReceiveWebhookCommand, WebhookProcessor,
};
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::SubscriptionRepository;

use super::dto::{CommandResponse, ErrorResponse, HealthResponse, WebhookResponse};

const REQUEST_ID_HEADER: &str = "x-request-id";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the webhook router.
///
/// Cloned per request; every dependency is behind an `Arc`.
#[derive(Clone)]
pub struct WebhookAppState {
    pub processor: Arc<WebhookProcessor>,
    pub buffer: Arc<DurableBuffer>,
    pub idempotency: Arc<IdempotencyStore>,
    pub guardian: Arc<ConnectionGuardian>,
    pub repository: Arc<dyn SubscriptionRepository>,
    /// Header the provider puts its signature in.
    pub signature_header: String,
}

impl WebhookAppState {
    pub fn entitlement_handler(&self) -> GetEntitlementHandler {
        GetEntitlementHandler::new(self.repository.clone())
    }

    pub fn audit_handler(&self) -> AuditSubscriptionsHandler {
        AuditSubscriptionsHandler::new(self.repository.clone())
    }

    pub fn stats_handler(&self) -> GetWebhookStatsHandler {
        GetWebhookStatsHandler::new(
            self.buffer.clone(),
            self.idempotency.clone(),
            self.guardian.clone(),
        )
    }

    pub fn retry_handler(&self) -> RetryFailedEventHandler {
        RetryFailedEventHandler::new(self.buffer.clone())
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Receiver
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/:provider - Receive a payment provider webhook
///
/// Always answers 2xx once the event has been absorbed; only signature and
/// payload failures are refused.
pub async fn receive_webhook(
    State(state): State<WebhookAppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    if !provider.eq_ignore_ascii_case(state.processor.source()) {
        let err = DomainError::new(
            ErrorCode::UnknownProvider,
            format!("Unknown webhook provider: {}", provider),
        )
        .with_detail("provider", provider);
        return Err(err.into());
    }

    let request_id = request_id(&headers);
    let signature = headers
        .get(state.signature_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = ReceiveWebhookCommand {
        body: body.to_vec(),
        signature,
    };

    match state.processor.receive(cmd).await {
        Ok(outcome) => {
            tracing::info!(
                request_id = %request_id,
                event_id = %outcome.event_id(),
                message = %outcome.message(),
                "Webhook acknowledged"
            );
            Ok((
                StatusCode::OK,
                Json(WebhookResponse::from_outcome(&outcome, request_id)),
            ))
        }
        Err(e) => Ok((
            e.status_code(),
            Json(WebhookResponse::failure(e.to_string(), request_id)),
        )),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Health and Operator Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /health - Store readiness and buffer depth
pub async fn health(State(state): State<WebhookAppState>) -> impl IntoResponse {
    let connection = state.guardian.state();
    let stats = state.buffer.stats().await;

    Json(HealthResponse {
        status: if connection.is_ready() { "ok" } else { "degraded" },
        store: connection.as_str(),
        buffer_pending: stats.pending,
        buffer_failed: stats.failed,
    })
}

/// GET /api/entitlements/:customer_id - Current entitlement for a customer
pub async fn get_entitlement(
    State(state): State<WebhookAppState>,
    Path(customer_id): Path<String>,
) -> Result<impl IntoResponse, WebhookApiError> {
    let view = state
        .entitlement_handler()
        .handle(GetEntitlementQuery { customer_id })
        .await?;
    Ok(Json(view))
}

/// GET /api/webhooks/stats - Buffer and idempotency counters
pub async fn get_webhook_stats(State(state): State<WebhookAppState>) -> impl IntoResponse {
    Json(state.stats_handler().handle().await)
}

/// GET /api/subscriptions/audit - Cross-check the two collections
pub async fn audit_subscriptions(
    State(state): State<WebhookAppState>,
) -> Result<impl IntoResponse, WebhookApiError> {
    let report = state.audit_handler().handle().await?;
    Ok(Json(report))
}

/// POST /api/webhooks/failed/:event_id/retry - Requeue a frozen event
pub async fn retry_failed_event(
    State(state): State<WebhookAppState>,
    Path(event_id): Path<String>,
) -> Result<impl IntoResponse, WebhookApiError> {
    state
        .retry_handler()
        .handle(RetryFailedEventCommand {
            event_id: event_id.clone(),
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CommandResponse {
            success: true,
            message: format!("Event {} requeued", event_id),
        }),
    ))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts domain errors to HTTP responses.
#[derive(Debug)]
pub struct WebhookApiError(pub DomainError);

impl From<DomainError> for WebhookApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0.code {
            ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorCode::BufferedEventNotFound | ErrorCode::UnknownProvider => {
                StatusCode::NOT_FOUND
            }
            ErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError | ErrorCode::NotificationFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if self.0.code.is_transient() {
            tracing::warn!(code = %self.0.code, message = %self.0.message, "Request failed on store");
        }

        (status, Json(ErrorResponse::from(self.0))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn request_id_prefers_incoming_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-123"));
        assert_eq!(request_id(&headers), "req-123");
    }

    #[test]
    fn request_id_is_generated_when_missing() {
        let id = request_id(&HeaderMap::new());
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn store_unavailable_maps_to_503() {
        let err = WebhookApiError(DomainError::new(ErrorCode::StoreUnavailable, "down"));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn unknown_buffered_event_maps_to_404() {
        let err = WebhookApiError(DomainError::new(ErrorCode::BufferedEventNotFound, "gone"));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_error_maps_to_500() {
        let err = WebhookApiError(DomainError::new(ErrorCode::DatabaseError, "bad query"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
