//! Webhook domain.
//!
//! Signature verification, payload parsing, event fingerprints and the
//! error taxonomy for the ingestion path.

mod errors;
mod event;
mod payload;
mod verifier;

pub use errors::WebhookError;
pub use event::{EventStatus, WebhookEvent};
pub use payload::{CustomerData, PaymentData, SubscriptionData, WebhookPayload};
pub use verifier::{signature_hex, verify, SignatureVerifier};
