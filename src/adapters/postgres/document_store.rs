//! PostgreSQL implementation of the store ports.
//!
//! Each collection is a table holding the full document as JSONB next to
//! its key columns. Tables are created by `register_collections` when a
//! connection is established; nothing creates them lazily at write time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tokio::sync::RwLock;

use crate::config::DatabaseConfig;
use crate::domain::subscription::{BillingSubscription, Entitlement};
use crate::ports::{Collection, StoreConnector, StoreError, SubscriptionRepository};

/// PostgreSQL document store.
///
/// The pool is replaced on every `connect`, so a reconnect after an outage
/// never reuses a pool whose connections all died.
pub struct PostgresDocumentStore {
    config: DatabaseConfig,
    pool: RwLock<Option<PgPool>>,
}

impl PostgresDocumentStore {
    /// Creates a store that connects lazily on the first `connect` call.
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
        }
    }

    async fn pool(&self) -> Result<PgPool, StoreError> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::Connection("not connected".to_string()))
    }
}

fn create_table_sql(collection: Collection) -> &'static str {
    match collection {
        Collection::BillingSubscriptions => {
            r#"
            CREATE TABLE IF NOT EXISTS billing_subscriptions (
                subscription_id TEXT NOT NULL,
                customer_id TEXT NOT NULL,
                status TEXT NOT NULL,
                document JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (subscription_id, customer_id)
            )
            "#
        }
        Collection::UserEntitlements => {
            r#"
            CREATE TABLE IF NOT EXISTS user_entitlements (
                customer_id TEXT PRIMARY KEY,
                subscription_id TEXT NOT NULL,
                status TEXT NOT NULL,
                document JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#
        }
    }
}

/// Classifies driver errors so the guardian can tell outages from bad queries.
fn map_sqlx_error(context: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Connection(format!("{}: {}", context, err)),
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => {
            StoreError::Serialization(format!("{}: {}", context, err))
        }
        other => StoreError::Query(format!("{}: {}", context, other)),
    }
}

#[async_trait]
impl StoreConnector for PostgresDocumentStore {
    async fn connect(&self) -> Result<(), StoreError> {
        let pool = PgPoolOptions::new()
            .min_connections(self.config.min_connections)
            .max_connections(self.config.max_connections)
            .acquire_timeout(self.config.acquire_timeout())
            .connect(&self.config.url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        if let Some(old) = self.pool.write().await.replace(pool) {
            old.close().await;
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }

    async fn register_collections(&self, collections: &[Collection]) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        for collection in collections {
            sqlx::query(create_table_sql(*collection))
                .execute(&pool)
                .await
                .map_err(|e| StoreError::CollectionUnavailable {
                    collection: *collection,
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    async fn verify_collections(&self, collections: &[Collection]) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        for collection in collections {
            let (exists,): (bool,) = sqlx::query_as("SELECT to_regclass($1) IS NOT NULL")
                .bind(collection.name())
                .fetch_one(&pool)
                .await
                .map_err(|e| map_sqlx_error("verify collections", e))?;

            if !exists {
                return Err(StoreError::CollectionUnavailable {
                    collection: *collection,
                    reason: "table does not exist".to_string(),
                });
            }

            // Existence is not enough; confirm this role can read it.
            sqlx::query(&format!("SELECT 1 FROM {} LIMIT 1", collection.name()))
                .execute(&pool)
                .await
                .map_err(|e| StoreError::CollectionUnavailable {
                    collection: *collection,
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for PostgresDocumentStore {
    async fn find_billing(
        &self,
        subscription_id: &str,
    ) -> Result<Option<BillingSubscription>, StoreError> {
        let pool = self.pool().await?;
        let row: Option<(Json<BillingSubscription>,)> = sqlx::query_as(
            r#"
            SELECT document FROM billing_subscriptions
            WHERE subscription_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&pool)
        .await
        .map_err(|e| map_sqlx_error("find billing subscription", e))?;

        Ok(row.map(|(Json(doc),)| doc))
    }

    async fn upsert_billing(&self, record: &BillingSubscription) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let updated_at: DateTime<Utc> = *record.updated_at.as_datetime();
        sqlx::query(
            r#"
            INSERT INTO billing_subscriptions (subscription_id, customer_id, status, document, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (subscription_id, customer_id) DO UPDATE SET
                status = EXCLUDED.status,
                document = EXCLUDED.document,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.subscription_id)
        .bind(&record.customer_id)
        .bind(record.status.as_str())
        .bind(Json(record))
        .bind(updated_at)
        .execute(&pool)
        .await
        .map_err(|e| map_sqlx_error("upsert billing subscription", e))?;

        Ok(())
    }

    async fn find_entitlement(&self, customer_id: &str) -> Result<Option<Entitlement>, StoreError> {
        let pool = self.pool().await?;
        let row: Option<(Json<Entitlement>,)> =
            sqlx::query_as("SELECT document FROM user_entitlements WHERE customer_id = $1")
                .bind(customer_id)
                .fetch_optional(&pool)
                .await
                .map_err(|e| map_sqlx_error("find entitlement", e))?;

        Ok(row.map(|(Json(doc),)| doc))
    }

    async fn upsert_entitlement(&self, record: &Entitlement) -> Result<(), StoreError> {
        let pool = self.pool().await?;
        let updated_at: DateTime<Utc> = *record.updated_at.as_datetime();
        sqlx::query(
            r#"
            INSERT INTO user_entitlements (customer_id, subscription_id, status, document, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (customer_id) DO UPDATE SET
                subscription_id = EXCLUDED.subscription_id,
                status = EXCLUDED.status,
                document = EXCLUDED.document,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.customer_id)
        .bind(&record.subscription_id)
        .bind(record.status.as_str())
        .bind(Json(record))
        .bind(updated_at)
        .execute(&pool)
        .await
        .map_err(|e| map_sqlx_error("upsert entitlement", e))?;

        Ok(())
    }

    async fn list_billing(&self) -> Result<Vec<BillingSubscription>, StoreError> {
        let pool = self.pool().await?;
        let rows: Vec<(Json<BillingSubscription>,)> = sqlx::query_as(
            "SELECT document FROM billing_subscriptions ORDER BY subscription_id, customer_id",
        )
        .fetch_all(&pool)
        .await
        .map_err(|e| map_sqlx_error("list billing subscriptions", e))?;

        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }

    async fn list_entitlements(&self) -> Result<Vec<Entitlement>, StoreError> {
        let pool = self.pool().await?;
        let rows: Vec<(Json<Entitlement>,)> =
            sqlx::query_as("SELECT document FROM user_entitlements ORDER BY customer_id")
                .fetch_all(&pool)
                .await
                .map_err(|e| map_sqlx_error("list entitlements", e))?;

        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }
}
