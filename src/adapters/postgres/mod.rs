//! PostgreSQL adapters - Database implementations for the store ports.
//!
//! - `PostgresDocumentStore` - Connection lifecycle plus the billing and
//!   entitlement collections as JSONB tables

mod document_store;

pub use document_store::PostgresDocumentStore;
