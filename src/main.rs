//! Subscription Gate server.
//!
//! Startup order: configuration, logging, snapshot hydration, store
//! connection, background loops, HTTP. Shutdown on Ctrl-C stops the HTTP
//! server, signals the loops and waits for the final snapshot.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subscription_gate::adapters::events::BroadcastNotifier;
use subscription_gate::adapters::http::{build_router, WebhookAppState};
use subscription_gate::adapters::memory::InMemorySubscriptionStore;
use subscription_gate::adapters::postgres::PostgresDocumentStore;
use subscription_gate::adapters::provider::{HttpPaymentProvider, ProviderApiConfig};
use subscription_gate::adapters::storage::FileSnapshotStorage;
use subscription_gate::application::{
    BufferDrainer, BufferDrainerConfig, BufferPolicy, ConnectionGuardian, DurableBuffer,
    GuardianSettings, IdempotencyStore, ProcessorSettings, WebhookProcessor,
};
use subscription_gate::config::{AppConfig, ConfigError, DatabaseConfig, ValidationError};
use subscription_gate::domain::webhook::SignatureVerifier;
use subscription_gate::ports::{SnapshotStorage, StoreConnector, StoreError, SubscriptionRepository};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("store unavailable at startup: {0}")]
    Store(#[from] StoreError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!(error = %e, "Subscription gate stopped");
        eprintln!("subscription-gate: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);
    if config.server.json_logs() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_store(
    config: &DatabaseConfig,
) -> (Arc<dyn StoreConnector>, Arc<dyn SubscriptionRepository>) {
    if config.is_memory() {
        tracing::warn!("Using in-memory subscription store; data is lost on restart");
        let store = Arc::new(InMemorySubscriptionStore::new());
        let connector: Arc<dyn StoreConnector> = store.clone();
        let repository: Arc<dyn SubscriptionRepository> = store;
        (connector, repository)
    } else {
        let store = Arc::new(PostgresDocumentStore::new(config.clone()));
        let connector: Arc<dyn StoreConnector> = store.clone();
        let repository: Arc<dyn SubscriptionRepository> = store;
        (connector, repository)
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        provider = %config.payment.provider,
        "Starting subscription gate"
    );

    let storage: Arc<dyn SnapshotStorage> =
        Arc::new(FileSnapshotStorage::new(&config.buffer.data_dir));
    let idempotency = Arc::new(IdempotencyStore::new(
        storage.clone(),
        config.buffer.idempotency_capacity,
    ));
    let buffer = Arc::new(DurableBuffer::new(
        storage,
        idempotency.clone(),
        BufferPolicy::from(&config.buffer),
    ));

    // Hydration failures start empty rather than refusing to boot.
    match idempotency.hydrate().await {
        Ok(count) => tracing::info!(count, "Processed event ids restored"),
        Err(e) => tracing::error!(error = %e, "Failed to restore processed event ids"),
    }
    match buffer.hydrate().await {
        Ok(count) => tracing::info!(count, "Buffered events restored"),
        Err(e) => tracing::error!(error = %e, "Failed to restore buffered events"),
    }

    let (connector, repository) = build_store(&config.database);
    let guardian = Arc::new(ConnectionGuardian::new(
        connector,
        GuardianSettings::from(&config.database),
    ));
    guardian.initialize().await?;

    let notifier = Arc::new(BroadcastNotifier::new());
    let verifier = SignatureVerifier::new(config.payment.webhook_secret.clone());

    let mut processor = WebhookProcessor::new(
        verifier,
        idempotency.clone(),
        buffer.clone(),
        guardian.clone(),
        repository.clone(),
        notifier,
        ProcessorSettings {
            source: config.payment.provider.clone(),
            ready_timeout: config.database.ready_timeout(),
            apply_timeout: config.database.write_timeout(),
        },
    );
    if let Some(api_config) = ProviderApiConfig::from_payment_config(&config.payment) {
        match HttpPaymentProvider::new(api_config) {
            Ok(provider) => processor = processor.with_provider(Arc::new(provider)),
            Err(e) => tracing::warn!(error = %e, "Provider lookups disabled"),
        }
    }
    let processor = Arc::new(processor);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reconnect = {
        let guardian = guardian.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { guardian.run_reconnect_loop(shutdown).await })
    };
    let health = {
        let guardian = guardian.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { guardian.run_health_monitor(shutdown).await })
    };
    let drainer = {
        let drainer = BufferDrainer::new(
            processor.clone(),
            idempotency.clone(),
            BufferDrainerConfig::from(&config.buffer),
        );
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { drainer.run(shutdown).await })
    };

    let state = WebhookAppState {
        processor,
        buffer,
        idempotency,
        guardian,
        repository,
        signature_header: config.payment.signature_header.clone(),
    };
    let app = build_router(
        state,
        config.server.request_timeout(),
        config.server.body_limit_bytes,
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down background tasks");
    let _ = shutdown_tx.send(true);
    for (name, task) in [("reconnect", reconnect), ("health", health), ("drainer", drainer)] {
        if let Err(e) = task.await {
            tracing::error!(task = name, error = %e, "Background task ended abnormally");
        }
    }

    tracing::info!("Subscription gate stopped cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
