//! Inbound webhook event as it moves through buffering and retry.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::WebhookError;
use super::payload::WebhookPayload;
use crate::domain::foundation::Timestamp;

/// Lifecycle of a buffered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Failed,
    /// Applied during a drain; leaves the buffer on the same write.
    Processed,
}

/// A webhook accepted after signature verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// Content-derived fingerprint, see [`WebhookEvent::fingerprint`].
    pub id: String,
    pub source: String,
    pub payload: serde_json::Value,
    pub received_at: Timestamp,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub status: EventStatus,
}

impl WebhookEvent {
    /// Builds an event from a verified body.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` if the body is not a valid event.
    pub fn from_raw(
        source: impl Into<String>,
        raw: &[u8],
        received_at: Timestamp,
    ) -> Result<(Self, WebhookPayload), WebhookError> {
        let source = source.into();
        let parsed = WebhookPayload::parse(raw)?;
        let payload: serde_json::Value = serde_json::from_slice(raw)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        let id = Self::fingerprint(&source, raw, received_at, parsed.provider_event_id());

        Ok((
            Self {
                id,
                source,
                payload,
                received_at,
                retry_count: 0,
                last_error: None,
                status: EventStatus::Pending,
            },
            parsed,
        ))
    }

    /// Deduplication fingerprint.
    ///
    /// Provider event ids are stable across re-deliveries, so when present
    /// they replace the body and arrival time as the hash input.
    pub fn fingerprint(
        source: &str,
        raw: &[u8],
        received_at: Timestamp,
        provider_event_id: Option<&str>,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(b"\n");
        match provider_event_id {
            Some(event_id) => hasher.update(event_id.as_bytes()),
            None => {
                hasher.update(raw);
                hasher.update(b"\n");
                hasher.update(received_at.to_rfc3339_millis().as_bytes());
            }
        }
        format!("{}:{}", source, hex::encode(hasher.finalize()))
    }

    /// Re-parses the stored payload.
    pub fn parsed_payload(&self) -> Result<WebhookPayload, WebhookError> {
        WebhookPayload::from_value(&self.payload)
    }

    pub fn event_type(&self) -> &str {
        self.payload
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or("UNKNOWN")
    }

    pub fn is_pending(&self) -> bool {
        self.status == EventStatus::Pending
    }

    pub fn is_failed(&self) -> bool {
        self.status == EventStatus::Failed
    }

    /// Age of the event at `now`, in whole hours.
    pub fn age_hours(&self, now: Timestamp) -> i64 {
        now.duration_since(&self.received_at).num_hours()
    }
}
