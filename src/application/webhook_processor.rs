//! WebhookProcessor - Orchestrates one webhook from bytes to stored status.
//!
//! `received → verified → (duplicate | new) → (applied | buffered | rejected)`
//!
//! Only signature and structural failures reach the caller as errors.
//! Everything past that point is absorbed: applied, buffered for retry, or
//! logged and dropped.
//!
//! Applying an event runs under its subscription's lock and a deadline.
//! A deadline miss counts as the store going away: the event is buffered
//! and the request still gets its acknowledgement.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::connection_guardian::ConnectionGuardian;
use super::dual_store_writer::{DualStoreWriter, StatusUpdate};
use super::durable_buffer::{BufferedEventApplier, DrainDecision, DrainReport, DurableBuffer};
use super::idempotency_store::IdempotencyStore;
use super::subscription_locks::SubscriptionLocks;
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{
    self, BillingSubscription, EventTarget, EventType, SubscriptionStatus, Transition,
    TransitionRejected, UnchangedReason,
};
use crate::domain::webhook::{SignatureVerifier, WebhookError, WebhookEvent, WebhookPayload};
use crate::ports::{EntitlementNotifier, PaymentProvider, StoreError, SubscriptionRepository};

/// Command to process one inbound webhook.
#[derive(Debug, Clone)]
pub struct ReceiveWebhookCommand {
    /// Exact request body, as signed by the provider.
    pub body: Vec<u8>,
    /// Signature header value, if sent.
    pub signature: Option<String>,
}

/// Result of webhook processing. Every variant is acknowledged with 2xx.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// Status written to both collections.
    Applied {
        event_id: String,
        subscription_id: String,
        status: SubscriptionStatus,
    },
    /// Legal event with nothing to write.
    Unchanged {
        event_id: String,
        reason: UnchangedReason,
    },
    /// Fingerprint already applied.
    Duplicate { event_id: String },
    /// Held in the durable buffer for a later drain.
    Buffered { event_id: String, reason: String },
    /// Illegal for the current status; logged and dropped.
    Rejected {
        event_id: String,
        rejection: TransitionRejected,
    },
}

impl WebhookOutcome {
    pub fn event_id(&self) -> &str {
        match self {
            WebhookOutcome::Applied { event_id, .. }
            | WebhookOutcome::Unchanged { event_id, .. }
            | WebhookOutcome::Duplicate { event_id }
            | WebhookOutcome::Buffered { event_id, .. }
            | WebhookOutcome::Rejected { event_id, .. } => event_id,
        }
    }

    pub fn message(&self) -> String {
        match self {
            WebhookOutcome::Applied { status, .. } => format!("Subscription is now {}", status),
            WebhookOutcome::Unchanged { reason, .. } => format!("No change: {}", reason),
            WebhookOutcome::Duplicate { .. } => "Event already processed".to_string(),
            WebhookOutcome::Buffered { .. } => "Event accepted for processing".to_string(),
            WebhookOutcome::Rejected { rejection, .. } => format!("Event ignored: {}", rejection),
        }
    }
}

/// What applying a payload did, before it is wrapped in an outcome.
#[derive(Debug, Clone, PartialEq)]
enum Applied {
    Changed {
        subscription_id: String,
        status: SubscriptionStatus,
    },
    Unchanged(UnchangedReason),
}

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// Provider tag stamped on events and history entries.
    pub source: String,
    /// Longest a request waits for the store before buffering.
    pub ready_timeout: Duration,
    /// Longest one event may spend reading and writing the store.
    pub apply_timeout: Duration,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            source: "asaas".to_string(),
            ready_timeout: Duration::from_millis(1500),
            apply_timeout: Duration::from_secs(5),
        }
    }
}

pub struct WebhookProcessor {
    verifier: SignatureVerifier,
    idempotency: Arc<IdempotencyStore>,
    buffer: Arc<DurableBuffer>,
    guardian: Arc<ConnectionGuardian>,
    repository: Arc<dyn SubscriptionRepository>,
    writer: DualStoreWriter,
    locks: SubscriptionLocks,
    provider: Option<Arc<dyn PaymentProvider>>,
    settings: ProcessorSettings,
}

impl WebhookProcessor {
    pub fn new(
        verifier: SignatureVerifier,
        idempotency: Arc<IdempotencyStore>,
        buffer: Arc<DurableBuffer>,
        guardian: Arc<ConnectionGuardian>,
        repository: Arc<dyn SubscriptionRepository>,
        notifier: Arc<dyn EntitlementNotifier>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            verifier,
            idempotency,
            buffer,
            guardian,
            writer: DualStoreWriter::new(repository.clone(), notifier),
            locks: SubscriptionLocks::new(),
            repository,
            provider: None,
            settings,
        }
    }

    /// Enables best-effort lookups against the provider API.
    pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn source(&self) -> &str {
        &self.settings.source
    }

    /// Processes one webhook.
    ///
    /// # Errors
    ///
    /// Only `SignatureInvalid`, `SignatureMissing` and `MalformedPayload`.
    pub async fn receive(&self, cmd: ReceiveWebhookCommand) -> Result<WebhookOutcome, WebhookError> {
        if let Err(e) = self.verifier.check(&cmd.body, cmd.signature.as_deref()) {
            tracing::warn!(error = %e, source = %self.settings.source, "Webhook signature rejected");
            return Err(e);
        }

        let (event, payload) =
            WebhookEvent::from_raw(&self.settings.source, &cmd.body, Timestamp::now()).map_err(
                |e| {
                    tracing::warn!(error = %e, "Malformed webhook payload");
                    e
                },
            )?;
        let event_id = event.id.clone();

        tracing::info!(
            event_id = %event_id,
            event_type = %payload.event,
            subscription_id = payload.subscription_id().unwrap_or_default(),
            "Webhook received"
        );

        if self.idempotency.has_processed(&event_id).await {
            tracing::info!(event_id = %event_id, "Duplicate webhook, already processed");
            return Ok(WebhookOutcome::Duplicate { event_id });
        }
        if self.idempotency.is_buffered(&event_id).await {
            return Ok(WebhookOutcome::Buffered {
                event_id,
                reason: "already buffered".to_string(),
            });
        }

        if let Err(e) = self.guardian.wait_until_ready(self.settings.ready_timeout).await {
            return Ok(self.buffer_event(event, e).await);
        }

        match self.apply_within_deadline(&event, payload).await {
            Ok(applied) => {
                self.idempotency.mark_processed(&event_id).await;
                Ok(match applied {
                    Applied::Changed {
                        subscription_id,
                        status,
                    } => WebhookOutcome::Applied {
                        event_id,
                        subscription_id,
                        status,
                    },
                    Applied::Unchanged(reason) => {
                        tracing::debug!(event_id = %event_id, reason = %reason, "Webhook left subscription unchanged");
                        WebhookOutcome::Unchanged { event_id, reason }
                    }
                })
            }
            Err(WebhookError::TransitionRejected(rejection)) => {
                tracing::warn!(
                    event_id = %event_id,
                    from = %rejection.from,
                    to = %rejection.to,
                    event_type = %rejection.event_type,
                    "Transition rejected"
                );
                self.idempotency.mark_processed(&event_id).await;
                Ok(WebhookOutcome::Rejected {
                    event_id,
                    rejection,
                })
            }
            Err(e) => {
                if let WebhookError::StoreUnavailable(reason) = &e {
                    self.guardian.report_disconnect(reason);
                }
                Ok(self.buffer_event(event, e).await)
            }
        }
    }

    /// Drains the buffer if the store is ready. `None` means skipped.
    pub async fn drain_buffer(&self) -> Option<DrainReport> {
        if !self.guardian.ready() {
            tracing::debug!("Store not ready, skipping buffer drain");
            return None;
        }
        Some(self.buffer.drain(self).await)
    }

    async fn buffer_event(&self, event: WebhookEvent, cause: WebhookError) -> WebhookOutcome {
        let event_id = event.id.clone();
        tracing::warn!(event_id = %event_id, cause = %cause, "Buffering webhook for retry");

        let outcome = self.buffer.enqueue(event).await;
        WebhookOutcome::Buffered {
            event_id,
            reason: if outcome.added {
                cause.to_string()
            } else {
                format!("{:?}", outcome.reason)
            },
        }
    }

    /// [`Self::apply`] bounded by `apply_timeout`.
    ///
    /// Elapsing drops the in-flight writes. A half-written event is safe to
    /// retry because its history entry pins the status it was applied from.
    async fn apply_within_deadline(
        &self,
        event: &WebhookEvent,
        payload: WebhookPayload,
    ) -> Result<Applied, WebhookError> {
        let deadline = self.settings.apply_timeout;
        match tokio::time::timeout(deadline, self.apply(event, payload)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    event_id = %event.id,
                    timeout_ms = deadline.as_millis() as u64,
                    "Store did not answer before the apply deadline"
                );
                Err(WebhookError::StoreUnavailable(format!(
                    "store write timed out after {}ms",
                    deadline.as_millis()
                )))
            }
        }
    }

    /// Resolves, transitions and writes one event.
    async fn apply(
        &self,
        event: &WebhookEvent,
        mut payload: WebhookPayload,
    ) -> Result<Applied, WebhookError> {
        let event_type = EventType::parse(&payload.event);
        if event_type.target() == EventTarget::Ignored {
            return Ok(Applied::Unchanged(UnchangedReason::UnmappedEvent(
                event_type.to_string(),
            )));
        }

        if payload.subscription_id().is_none() {
            self.discover_subscription(&mut payload).await;
        }
        let Some(subscription_id) = payload.subscription_id().map(str::to_string) else {
            return Ok(Applied::Unchanged(UnchangedReason::NotSubscriptionRelated));
        };

        let _held = self.locks.acquire(&subscription_id).await;
        let existing = self
            .repository
            .find_billing(&subscription_id)
            .await
            .map_err(store_failure)?;

        if existing.is_none() && needs_enrichment(&payload) {
            self.enrich(&mut payload, &subscription_id).await;
        }

        let customer_id = payload
            .customer_id()
            .map(str::to_string)
            .or_else(|| existing.as_ref().map(|doc| doc.customer_id.clone()))
            .ok_or_else(|| {
                WebhookError::WriteFailure(format!(
                    "customer for subscription {} could not be resolved",
                    subscription_id
                ))
            })?;

        let current = current_status(existing.as_ref(), &event.id);
        let transition = subscription::next(current, &event_type, &payload)?;

        let (status, ends_at) = match transition {
            Transition::Unchanged { reason } => return Ok(Applied::Unchanged(reason)),
            Transition::Changed { to, ends_at, .. } => (to, ends_at),
        };

        let update = StatusUpdate {
            subscription_id: subscription_id.clone(),
            customer_id,
            user_id: payload.user_id().map(str::to_string),
            status,
            ends_at,
            event_id: event.id.clone(),
            source: event.source.clone(),
            value: payload.value_cents(),
            next_due_date: payload.next_due_date().map(str::to_string),
            cycle: payload.cycle().map(str::to_string),
            plan: payload.plan().map(str::to_string),
            applied_at: Timestamp::now(),
        };
        self.writer.apply(&update).await?;

        Ok(Applied::Changed {
            subscription_id,
            status,
        })
    }

    async fn discover_subscription(&self, payload: &mut WebhookPayload) {
        let (Some(provider), Some(payment_id)) =
            (self.provider.as_ref(), payload.payment_id().map(str::to_string))
        else {
            return;
        };

        match provider.fetch_payment(&payment_id).await {
            Ok(Some(payment)) => payload.enrich_payment(payment),
            Ok(None) => {
                tracing::debug!(payment_id = %payment_id, "Provider has no such payment");
            }
            Err(e) => {
                tracing::warn!(payment_id = %payment_id, error = %e, "Payment lookup failed");
            }
        }
    }

    async fn enrich(&self, payload: &mut WebhookPayload, subscription_id: &str) {
        let Some(provider) = self.provider.as_ref() else {
            return;
        };

        match provider.fetch_subscription(subscription_id).await {
            Ok(Some(subscription)) => {
                tracing::debug!(subscription_id = %subscription_id, "Enriched webhook from provider");
                payload.enrich_subscription(subscription);
            }
            Ok(None) => {
                tracing::debug!(subscription_id = %subscription_id, "Provider has no such subscription");
            }
            Err(e) => {
                tracing::warn!(
                    subscription_id = %subscription_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Subscription lookup failed, continuing without it"
                );
            }
        }
    }
}

#[async_trait]
impl BufferedEventApplier for WebhookProcessor {
    async fn apply_buffered(&self, event: &WebhookEvent) -> DrainDecision {
        if !self.guardian.ready() {
            return DrainDecision::Halt("store not ready".to_string());
        }

        let payload = match event.parsed_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "Dropping unparseable buffered event");
                return DrainDecision::Done;
            }
        };

        match self.apply_within_deadline(event, payload).await {
            Ok(Applied::Changed { status, .. }) => {
                tracing::info!(
                    event_id = %event.id,
                    status = %status,
                    attempt = event.retry_count + 1,
                    "Buffered event applied"
                );
                DrainDecision::Done
            }
            Ok(Applied::Unchanged(reason)) => {
                tracing::debug!(event_id = %event.id, reason = %reason, "Buffered event left subscription unchanged");
                DrainDecision::Done
            }
            Err(WebhookError::TransitionRejected(rejection)) => {
                tracing::warn!(
                    event_id = %event.id,
                    from = %rejection.from,
                    to = %rejection.to,
                    event_type = %rejection.event_type,
                    "Transition rejected"
                );
                DrainDecision::Done
            }
            Err(WebhookError::StoreUnavailable(reason)) => {
                self.guardian.report_disconnect(&reason);
                DrainDecision::Halt(reason)
            }
            Err(e) => DrainDecision::Failed(e.to_string()),
        }
    }
}

/// Status the event should be applied against.
///
/// If this event already reached the billing history (a partial write
/// being retried), the status from before it is used so the transition
/// comes out the same as on the first attempt.
fn current_status(
    existing: Option<&BillingSubscription>,
    event_id: &str,
) -> Option<SubscriptionStatus> {
    let doc = existing?;
    match doc.status_history.status_before(event_id) {
        Some(before) => before,
        None => Some(doc.status),
    }
}

fn needs_enrichment(payload: &WebhookPayload) -> bool {
    payload.customer_id().is_none() || payload.value_cents().is_none() || payload.cycle().is_none()
}

fn store_failure(err: StoreError) -> WebhookError {
    if err.is_connection() {
        WebhookError::StoreUnavailable(err.to_string())
    } else {
        WebhookError::WriteFailure(err.to_string())
    }
}
