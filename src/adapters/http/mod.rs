//! HTTP adapters - REST API implementations.

pub mod webhook;

use std::time::Duration;

use ::http::HeaderName;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use webhook::{webhook_router, WebhookAppState};

/// Builds the served application with request ids, tracing, a timeout and
/// a body size limit.
///
/// A request id supplied by the caller is kept; otherwise one is generated
/// and echoed back in the response.
pub fn build_router(
    state: WebhookAppState,
    request_timeout: Duration,
    body_limit: usize,
) -> Router {
    let request_id = HeaderName::from_static("x-request-id");

    webhook_router()
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
}
