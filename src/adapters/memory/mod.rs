//! In-memory store adapters (testing, and running without a database).

mod in_memory_subscription_store;

pub use in_memory_subscription_store::InMemorySubscriptionStore;
