//! Payment provider configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Payment provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Provider tag used as the webhook source and route segment
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Webhook signing secret. Absent means signatures are not checked.
    #[serde(default)]
    pub webhook_secret: Option<SecretString>,

    /// Header carrying the webhook signature
    #[serde(default = "default_signature_header")]
    pub signature_header: String,

    /// Provider REST API base URL, enables lookups when set
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Provider REST API key
    #[serde(default)]
    pub api_key: Option<SecretString>,

    /// Provider API timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
}

impl PaymentConfig {
    /// True if a non-blank webhook secret is configured
    pub fn has_webhook_secret(&self) -> bool {
        self.webhook_secret
            .as_ref()
            .is_some_and(|s| !s.expose_secret().trim().is_empty())
    }

    /// True if provider lookups can be made
    pub fn lookups_enabled(&self) -> bool {
        self.api_base_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Validate payment configuration
    ///
    /// Production refuses to run without a webhook secret.
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.provider.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__PROVIDER"));
        }
        if self.signature_header.trim().is_empty() {
            return Err(ValidationError::InvalidSignatureHeader);
        }
        if production && !self.has_webhook_secret() {
            return Err(ValidationError::MissingRequired("PAYMENT__WEBHOOK_SECRET"));
        }
        if let Some(url) = self.api_base_url.as_deref().filter(|u| !u.is_empty()) {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(ValidationError::InvalidProviderUrl);
            }
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            webhook_secret: None,
            signature_header: default_signature_header(),
            api_base_url: None,
            api_key: None,
            api_timeout_secs: default_api_timeout(),
        }
    }
}

fn default_provider() -> String {
    "asaas".to_string()
}

fn default_signature_header() -> String {
    "x-signature".to_string()
}

fn default_api_timeout() -> u64 {
    10
}
