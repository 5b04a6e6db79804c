//! Payment provider adapters.
//!
//! - `HttpPaymentProvider` - REST lookups against the provider API
//! - `MockPaymentProvider` - Configurable test double

mod http_payment_provider;
mod mock_payment_provider;

pub use http_payment_provider::{HttpPaymentProvider, ProviderApiConfig};
pub use mock_payment_provider::MockPaymentProvider;
