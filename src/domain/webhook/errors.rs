//! Webhook error taxonomy.
//!
//! Every failure in the ingestion path is one of these. Retryable errors
//! send the event to the durable buffer; the rest are logged and dropped.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::subscription::TransitionRejected;

/// Errors that occur during webhook processing.
#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    /// Signature does not match the body.
    #[error("Invalid signature")]
    SignatureInvalid,

    /// A secret is configured but the request carried no signature.
    #[error("Missing signature")]
    SignatureMissing,

    /// Body is not a structurally valid event.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Backing store is not ready.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The event is illegal for the subscription's current status.
    #[error("Transition rejected: {0}")]
    TransitionRejected(#[from] TransitionRejected),

    /// Applying the event failed and may succeed later.
    #[error("Write failure: {0}")]
    WriteFailure(String),

    /// The event failed too many times and is frozen for manual review.
    #[error("Retry limit of {attempts} exceeded: {last_error}")]
    RetryExceeded { attempts: u32, last_error: String },
}

impl WebhookError {
    /// Returns true if the event should be buffered and retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::StoreUnavailable(_) | WebhookError::WriteFailure(_)
        )
    }

    /// Maps the error to the HTTP status returned to the provider.
    ///
    /// Only authentication and structural failures are refused. Everything
    /// else has been absorbed (buffered or logged) and is acknowledged so
    /// the provider does not start its own retry cycle.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::SignatureInvalid | WebhookError::SignatureMissing => {
                StatusCode::UNAUTHORIZED
            }

            WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,

            WebhookError::StoreUnavailable(_)
            | WebhookError::TransitionRejected(_)
            | WebhookError::WriteFailure(_)
            | WebhookError::RetryExceeded { .. } => StatusCode::OK,
        }
    }
}
