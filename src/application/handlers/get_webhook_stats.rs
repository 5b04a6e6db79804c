//! GetWebhookStatsHandler - Buffer and idempotency counters for operators.

use std::sync::Arc;

use serde::Serialize;

use crate::application::connection_guardian::ConnectionGuardian;
use crate::application::durable_buffer::DurableBuffer;
use crate::application::idempotency_store::IdempotencyStore;
use crate::domain::foundation::Timestamp;
use crate::domain::webhook::WebhookError;

/// A frozen event awaiting manual reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEventView {
    pub id: String,
    pub event_type: String,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub received_at: Timestamp,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStats {
    pub store: &'static str,
    pub store_ready: bool,
    pub pending: usize,
    pub failed: usize,
    pub processed_ids: usize,
    pub max_retries: u32,
    pub failed_events: Vec<FailedEventView>,
}

pub struct GetWebhookStatsHandler {
    buffer: Arc<DurableBuffer>,
    idempotency: Arc<IdempotencyStore>,
    guardian: Arc<ConnectionGuardian>,
}

impl GetWebhookStatsHandler {
    pub fn new(
        buffer: Arc<DurableBuffer>,
        idempotency: Arc<IdempotencyStore>,
        guardian: Arc<ConnectionGuardian>,
    ) -> Self {
        Self {
            buffer,
            idempotency,
            guardian,
        }
    }

    pub async fn handle(&self) -> WebhookStats {
        let stats = self.buffer.stats().await;
        let state = self.guardian.state();

        let failed_events = stats
            .failed_events
            .iter()
            .map(|event| FailedEventView {
                id: event.id.clone(),
                event_type: event.event_type().to_string(),
                retry_count: event.retry_count,
                last_error: event.last_error.clone(),
                received_at: event.received_at,
                error: WebhookError::RetryExceeded {
                    attempts: event.retry_count,
                    last_error: event.last_error.clone().unwrap_or_default(),
                }
                .to_string(),
            })
            .collect();

        WebhookStats {
            store: state.as_str(),
            store_ready: state.is_ready(),
            pending: stats.pending,
            failed: stats.failed,
            processed_ids: self.idempotency.len().await,
            max_retries: self.buffer.policy().max_retries,
            failed_events,
        }
    }
}
