//! HTTP payment provider adapter.
//!
//! Implements the read-only `PaymentProvider` lookups against the provider's
//! REST API (`GET /subscriptions/{id}`, `GET /payments/{id}`).
//!
//! # Configuration
//!
//! ```ignore
//! let config = ProviderApiConfig::new("https://api.asaas.com/v3", api_key);
//! let provider = HttpPaymentProvider::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::config::PaymentConfig;
use crate::domain::webhook::{PaymentData, SubscriptionData};
use crate::ports::{PaymentError, PaymentProvider};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "access_token";

/// Provider REST API configuration.
#[derive(Clone)]
pub struct ProviderApiConfig {
    /// Base URL, without trailing slash.
    api_base_url: String,

    /// API key sent on every request.
    api_key: Option<SecretString>,

    /// Per-request timeout.
    timeout: Duration,
}

impl ProviderApiConfig {
    /// Create a new API configuration.
    pub fn new(api_base_url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(10),
        }
    }

    /// Build from the payment section. `None` when no API URL is configured.
    pub fn from_payment_config(config: &PaymentConfig) -> Option<Self> {
        let url = config.api_base_url.as_deref().filter(|u| !u.is_empty())?;
        Some(Self::new(url, config.api_key.clone()).with_timeout(config.api_timeout()))
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Payment provider lookups over HTTP.
pub struct HttpPaymentProvider {
    config: ProviderApiConfig,
    http_client: reqwest::Client,
}

impl HttpPaymentProvider {
    /// Create a new adapter with the given configuration.
    pub fn new(config: ProviderApiConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);

        let mut request = self.http_client.get(&url);
        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PaymentError::Unauthorized {
                status: status.as_u16(),
            });
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PaymentError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .json::<T>()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;

        Ok(Some(body))
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionData>, PaymentError> {
        tracing::debug!(subscription_id, "Fetching subscription from provider");
        self.get_json(&format!("/subscriptions/{}", subscription_id))
            .await
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<Option<PaymentData>, PaymentError> {
        tracing::debug!(payment_id, "Fetching payment from provider");
        self.get_json(&format!("/payments/{}", payment_id)).await
    }
}
