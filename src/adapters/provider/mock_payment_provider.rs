//! Mock payment provider for testing.
//!
//! Supports pre-configured lookups, error injection and call tracking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::webhook::{PaymentData, SubscriptionData};
use crate::ports::{PaymentError, PaymentProvider};

/// Mock payment provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
/// mock.add_subscription(SubscriptionData { id: Some("sub_1".into()), .. });
/// mock.set_error(PaymentError::Network("down".to_string()));
/// ```
#[derive(Clone, Default)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    subscriptions: HashMap<String, SubscriptionData>,
    payments: HashMap<String, PaymentData>,
    error: Option<PaymentError>,
    calls: Vec<String>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicked test thread must not hide later assertions.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a subscription under its `id`.
    pub fn add_subscription(&self, subscription: SubscriptionData) {
        let id = subscription.id.clone().unwrap_or_default();
        self.state().subscriptions.insert(id, subscription);
    }

    /// Registers a payment under its `id`.
    pub fn add_payment(&self, payment: PaymentData) {
        let id = payment.id.clone().unwrap_or_default();
        self.state().payments.insert(id, payment);
    }

    /// Every call fails with `error` until cleared.
    pub fn set_error(&self, error: PaymentError) {
        self.state().error = Some(error);
    }

    pub fn clear_error(&self) {
        self.state().error = None;
    }

    /// Calls made so far, as `"subscription:<id>"` / `"payment:<id>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionData>, PaymentError> {
        let mut state = self.state();
        state.calls.push(format!("subscription:{}", subscription_id));
        if let Some(err) = state.error.clone() {
            return Err(err);
        }
        Ok(state.subscriptions.get(subscription_id).cloned())
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<PaymentData>, PaymentError> {
        let mut state = self.state();
        state.calls.push(format!("payment:{}", payment_id));
        if let Some(err) = state.error.clone() {
            return Err(err);
        }
        Ok(state.payments.get(payment_id).cloned())
    }
}
