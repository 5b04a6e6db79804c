//! Payment provider port for subscription and payment lookups.
//!
//! The pipeline never drives the provider; it only reads back a
//! subscription or payment to fill details a webhook left out. Lookups are
//! best-effort and callers continue without them on failure.

use async_trait::async_trait;

use crate::domain::webhook::{PaymentData, SubscriptionData};

/// Port for read-only payment provider lookups.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// `GET /subscriptions/{id}`. Returns `None` if the provider does not know it.
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionData>, PaymentError>;

    /// `GET /payments/{id}`. Returns `None` if the provider does not know it.
    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<PaymentData>, PaymentError>;
}

/// Why a provider lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("network error: {0}")]
    Network(String),

    #[error("provider rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("provider rate limit exceeded")]
    RateLimited,

    #[error("provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl PaymentError {
    /// Worth asking again later. Credentials and bad bodies will not fix themselves.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Network(_) | PaymentError::RateLimited => true,
            PaymentError::Provider { status, .. } => *status >= 500,
            PaymentError::Unauthorized { .. } | PaymentError::InvalidResponse(_) => false,
        }
    }
}
