//! HTTP adapter for webhook ingestion and operator endpoints.
//!
//! - `GET /health` - Store readiness and buffer depth
//! - `POST /webhooks/:provider` - Receive a payment provider webhook
//! - `GET /api/entitlements/:customer_id` - Current entitlement
//! - `GET /api/webhooks/stats` - Buffer and idempotency counters
//! - `POST /api/webhooks/failed/:event_id/retry` - Requeue a frozen event
//! - `GET /api/subscriptions/audit` - Consistency audit

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{WebhookApiError, WebhookAppState};
pub use routes::{api_routes, webhook_router, webhook_routes};
