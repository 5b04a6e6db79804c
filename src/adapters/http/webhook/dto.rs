//! HTTP DTOs for the webhook and operator endpoints.
//!
//! Field names are camelCase on the wire.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::application::WebhookOutcome;
use crate::domain::foundation::DomainError;

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body returned to the payment provider for every webhook delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl WebhookResponse {
    pub fn from_outcome(outcome: &WebhookOutcome, request_id: String) -> Self {
        Self {
            success: true,
            message: outcome.message(),
            request_id,
            event_id: Some(outcome.event_id().to_string()),
        }
    }

    pub fn failure(message: impl Into<String>, request_id: String) -> Self {
        Self {
            success: false,
            message: message.into(),
            request_id,
            event_id: None,
        }
    }
}

/// Liveness and readiness summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok` when the store is ready, `degraded` while events are buffered.
    pub status: &'static str,
    pub store: &'static str,
    pub buffer_pending: usize,
    pub buffer_failed: usize,
}

/// Acknowledgement for operator commands.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
}

/// Error body for non-webhook failures. Keys are snake_case.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error_code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl From<DomainError> for ErrorResponse {
    fn from(err: DomainError) -> Self {
        Self {
            error_code: err.code.as_str(),
            message: err.message,
            details: err.details,
        }
    }
}
