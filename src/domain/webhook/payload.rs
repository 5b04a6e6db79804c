//! Provider webhook payload.
//!
//! Only the fields the pipeline reads are modelled; anything else in the
//! body is kept on the buffered event as raw JSON.

use serde::{Deserialize, Serialize};

use super::errors::WebhookError;

/// Payment object embedded in payment events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub billing_type: Option<String>,
}

/// Subscription object embedded in subscription events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub next_due_date: Option<String>,
    #[serde(default)]
    pub cycle: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
}

/// Customer object, present on some events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
}

/// Parsed webhook body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub event: String,
    /// Provider-assigned event id, when sent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub payment: Option<PaymentData>,
    #[serde(default)]
    pub subscription: Option<SubscriptionData>,
    #[serde(default)]
    pub customer: Option<CustomerData>,
}

impl WebhookPayload {
    /// Parses and structurally validates a raw body.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` if the body is not a JSON object or has no event type.
    pub fn parse(raw: &[u8]) -> Result<Self, WebhookError> {
        let payload: WebhookPayload = serde_json::from_slice(raw)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Parses a payload previously stored as JSON.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, WebhookError> {
        let payload: WebhookPayload = serde_json::from_value(value.clone())
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<(), WebhookError> {
        if self.event.trim().is_empty() {
            return Err(WebhookError::MalformedPayload(
                "missing event type".to_string(),
            ));
        }
        Ok(())
    }

    /// Provider event id, ignoring blank values.
    pub fn provider_event_id(&self) -> Option<&str> {
        non_blank(self.id.as_deref())
    }

    pub fn subscription_id(&self) -> Option<&str> {
        non_blank(self.payment.as_ref().and_then(|p| p.subscription.as_deref()))
            .or_else(|| non_blank(self.subscription.as_ref().and_then(|s| s.id.as_deref())))
    }

    pub fn customer_id(&self) -> Option<&str> {
        non_blank(self.payment.as_ref().and_then(|p| p.customer.as_deref()))
            .or_else(|| non_blank(self.subscription.as_ref().and_then(|s| s.customer.as_deref())))
            .or_else(|| non_blank(self.customer.as_ref().and_then(|c| c.id.as_deref())))
    }

    /// Local user reference carried by the provider.
    pub fn user_id(&self) -> Option<&str> {
        non_blank(self.customer.as_ref().and_then(|c| c.external_reference.as_deref())).or_else(
            || non_blank(self.subscription.as_ref().and_then(|s| s.external_reference.as_deref())),
        )
    }

    pub fn payment_id(&self) -> Option<&str> {
        non_blank(self.payment.as_ref().and_then(|p| p.id.as_deref()))
    }

    /// Charge value in cents.
    pub fn value_cents(&self) -> Option<i64> {
        self.subscription
            .as_ref()
            .and_then(|s| s.value)
            .or_else(|| self.payment.as_ref().and_then(|p| p.value))
            .map(to_cents)
    }

    pub fn next_due_date(&self) -> Option<&str> {
        non_blank(self.subscription.as_ref().and_then(|s| s.next_due_date.as_deref()))
            .or_else(|| non_blank(self.payment.as_ref().and_then(|p| p.due_date.as_deref())))
    }

    pub fn cycle(&self) -> Option<&str> {
        non_blank(self.subscription.as_ref().and_then(|s| s.cycle.as_deref()))
    }

    /// Plan label shown to entitlement readers.
    pub fn plan(&self) -> Option<&str> {
        non_blank(self.subscription.as_ref().and_then(|s| s.description.as_deref()))
            .or_else(|| self.cycle())
    }

    /// Subscription status as reported by the provider.
    pub fn provider_status(&self) -> Option<&str> {
        non_blank(self.subscription.as_ref().and_then(|s| s.status.as_deref()))
    }

    /// Merges subscription details fetched from the provider into fields
    /// the webhook left empty.
    pub fn enrich_subscription(&mut self, fetched: SubscriptionData) {
        let current = self.subscription.get_or_insert_with(SubscriptionData::default);
        fill(&mut current.id, fetched.id);
        fill(&mut current.customer, fetched.customer);
        if current.value.is_none() {
            current.value = fetched.value;
        }
        fill(&mut current.next_due_date, fetched.next_due_date);
        fill(&mut current.cycle, fetched.cycle);
        fill(&mut current.status, fetched.status);
        fill(&mut current.description, fetched.description);
        fill(&mut current.external_reference, fetched.external_reference);
    }

    /// Merges payment details fetched from the provider.
    pub fn enrich_payment(&mut self, fetched: PaymentData) {
        let current = self.payment.get_or_insert_with(PaymentData::default);
        fill(&mut current.id, fetched.id);
        fill(&mut current.customer, fetched.customer);
        fill(&mut current.subscription, fetched.subscription);
        if current.value.is_none() {
            current.value = fetched.value;
        }
        fill(&mut current.due_date, fetched.due_date);
        fill(&mut current.status, fetched.status);
        fill(&mut current.billing_type, fetched.billing_type);
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if non_blank(slot.as_deref()).is_none() {
        if let Some(v) = value {
            *slot = Some(v);
        }
    }
}

fn to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}
