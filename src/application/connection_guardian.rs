//! ConnectionGuardian - Owns the backing-store connection lifecycle.
//!
//! Two independent background tasks keep the store usable:
//!
//! - the reconnect loop wakes on a disconnect report and retries with
//!   exponential backoff until the store is ready again;
//! - the health monitor pings on a fixed interval and reports disconnects
//!   nobody else noticed.
//!
//! "Ready" means connected *and* every required collection verified.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::time;

use crate::config::DatabaseConfig;
use crate::domain::webhook::WebhookError;
use crate::ports::{Collection, StoreConnector, StoreError};

/// Connection state as seen by request handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

impl ConnectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
        }
    }
}

/// `delay = min(max, base * 1.5^attempt)`, reset on success.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl ExponentialBackoff {
    const FACTOR: f64 = 1.5;

    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempt: 0,
        }
    }

    /// Delay for a given attempt number, without advancing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(128) as i32;
        let nanos = self.base.as_nanos() as f64 * Self::FACTOR.powi(exponent);
        Duration::from_nanos(nanos.min(self.max.as_nanos() as f64) as u64)
    }

    /// Returns the current delay and advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[derive(Debug, Clone)]
pub struct GuardianSettings {
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub health_check_interval: Duration,
    pub fail_fast_on_startup: bool,
}

impl Default for GuardianSettings {
    fn default() -> Self {
        Self {
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
            health_check_interval: Duration::from_secs(30),
            fail_fast_on_startup: false,
        }
    }
}

impl From<&DatabaseConfig> for GuardianSettings {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            reconnect_base_delay: config.reconnect_base_delay(),
            reconnect_max_delay: config.reconnect_max_delay(),
            health_check_interval: config.health_check_interval(),
            fail_fast_on_startup: config.fail_fast_on_startup,
        }
    }
}

pub struct ConnectionGuardian {
    connector: Arc<dyn StoreConnector>,
    state: watch::Sender<ConnectionState>,
    disconnected: Notify,
    settings: GuardianSettings,
}

impl ConnectionGuardian {
    pub fn new(connector: Arc<dyn StoreConnector>, settings: GuardianSettings) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            state,
            disconnected: Notify::new(),
            settings,
        }
    }

    pub fn ready(&self) -> bool {
        self.state().is_ready()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Waits at most `timeout` for the store to become ready.
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` when the timeout elapses first.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), WebhookError> {
        if self.ready() {
            return Ok(());
        }

        let mut rx = self.subscribe();
        let wait = async move { rx.wait_for(|s| s.is_ready()).await.map(|_| ()) };
        match time::timeout(timeout, wait).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(WebhookError::StoreUnavailable(
                "connection guardian stopped".to_string(),
            )),
            Err(_) => Err(WebhookError::StoreUnavailable(format!(
                "store not ready after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    /// Startup connection attempt.
    ///
    /// With `fail_fast_on_startup` a failure is returned; otherwise the
    /// process continues in degraded mode and the reconnect loop takes over.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        match self.establish().await {
            Ok(()) => Ok(()),
            Err(e) if self.settings.fail_fast_on_startup => {
                tracing::error!(error = %e, "Store unavailable at startup");
                Err(e)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Store unavailable at startup, running in degraded mode (webhooks are buffered)"
                );
                self.disconnected.notify_one();
                Ok(())
            }
        }
    }

    /// Connects, registers and verifies the required collections.
    pub async fn establish(&self) -> Result<(), StoreError> {
        self.state.send_replace(ConnectionState::Connecting);

        let result = async {
            self.connector.connect().await?;
            self.connector
                .register_collections(&Collection::REQUIRED)
                .await?;
            self.connector.verify_collections(&Collection::REQUIRED).await
        }
        .await;

        match result {
            Ok(()) => {
                self.state.send_replace(ConnectionState::Ready);
                tracing::info!("Store connected, required collections verified");
                Ok(())
            }
            Err(e) => {
                self.state.send_replace(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Marks the store as gone and wakes the reconnect loop.
    ///
    /// Called by anything that sees a connection-class store error.
    pub fn report_disconnect(&self, reason: &str) {
        let was_ready = self.state.send_if_modified(|state| {
            if state.is_ready() {
                *state = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
        if was_ready {
            tracing::warn!(reason = %reason, "Store disconnect detected");
            self.disconnected.notify_one();
        }
    }

    /// One health probe. Returns the readiness afterwards.
    pub async fn check_health(&self) -> bool {
        match self.state() {
            ConnectionState::Ready => match self.connector.ping().await {
                Ok(()) => true,
                Err(e) => {
                    self.report_disconnect(&e.to_string());
                    false
                }
            },
            ConnectionState::Disconnected => {
                // A lost notification would leave the reconnect loop asleep.
                self.disconnected.notify_one();
                false
            }
            ConnectionState::Connecting => false,
        }
    }

    /// Reconnect loop. Runs until `shutdown` flips to true.
    pub async fn run_reconnect_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = ExponentialBackoff::new(
            self.settings.reconnect_base_delay,
            self.settings.reconnect_max_delay,
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Reconnect loop stopping");
                        return;
                    }
                }
                _ = self.disconnected.notified() => {
                    if !self.reconnect(&mut backoff, &mut shutdown).await {
                        return;
                    }
                }
            }
        }
    }

    /// Returns false if shutdown was requested while reconnecting.
    async fn reconnect(
        &self,
        backoff: &mut ExponentialBackoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> bool {
        while !self.ready() {
            match self.establish().await {
                Ok(()) => {
                    tracing::info!(attempts = backoff.attempt() + 1, "Store reconnected");
                    backoff.reset();
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Store reconnect failed"
                    );
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                return false;
                            }
                        }
                    }
                }
            }
        }
        true
    }

    /// Periodic health monitor. Runs until `shutdown` flips to true.
    pub async fn run_health_monitor(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.settings.health_check_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Health monitor stopping");
                        return;
                    }
                }
                _ = interval.tick() => {
                    let ready = self.check_health().await;
                    tracing::trace!(ready, "Store health check");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;

    fn settings() -> GuardianSettings {
        GuardianSettings {
            reconnect_base_delay: Duration::from_millis(5),
            reconnect_max_delay: Duration::from_millis(20),
            health_check_interval: Duration::from_millis(10),
            fail_fast_on_startup: false,
        }
    }

    fn guardian(store: &InMemorySubscriptionStore) -> ConnectionGuardian {
        ConnectionGuardian::new(Arc::new(store.clone()), settings())
    }

    #[test]
    fn backoff_grows_by_half_and_caps() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_millis(1000), Duration::from_millis(3000));

        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2250));
        assert_eq!(backoff.next_delay(), Duration::from_millis(3000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(3000));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn establish_requires_verified_collections() {
        let store = InMemorySubscriptionStore::new();
        store.set_registration_broken(true);
        let guardian = guardian(&store);

        assert!(guardian.establish().await.is_err());
        assert!(!guardian.ready());
        assert_eq!(store.connect_count(), 1);

        store.set_registration_broken(false);
        guardian.establish().await.unwrap();
        assert!(guardian.ready());
    }

    #[tokio::test]
    async fn initialize_degrades_unless_fail_fast() {
        let store = InMemorySubscriptionStore::new();
        store.set_available(false);

        let degraded = guardian(&store);
        assert!(degraded.initialize().await.is_ok());
        assert!(!degraded.ready());

        let strict = ConnectionGuardian::new(
            Arc::new(store.clone()),
            GuardianSettings {
                fail_fast_on_startup: true,
                ..settings()
            },
        );
        assert!(strict.initialize().await.is_err());
    }

    #[tokio::test]
    async fn wait_until_ready_times_out() {
        let store = InMemorySubscriptionStore::new();
        let guardian = guardian(&store);

        let result = guardian.wait_until_ready(Duration::from_millis(10)).await;

        assert!(matches!(result, Err(WebhookError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn reconnect_loop_recovers_after_outage() {
        let store = InMemorySubscriptionStore::new();
        let guardian = Arc::new(guardian(&store));
        guardian.establish().await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = {
            let guardian = guardian.clone();
            tokio::spawn(async move { guardian.run_reconnect_loop(shutdown_rx).await })
        };

        store.set_available(false);
        guardian.report_disconnect("test outage");
        assert!(!guardian.ready());

        time::sleep(Duration::from_millis(30)).await;
        assert!(!guardian.ready());

        store.set_available(true);
        guardian
            .wait_until_ready(Duration::from_secs(2))
            .await
            .unwrap();

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn health_monitor_detects_silent_disconnect() {
        let store = InMemorySubscriptionStore::new();
        let guardian = Arc::new(guardian(&store));
        guardian.establish().await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = {
            let guardian = guardian.clone();
            tokio::spawn(async move { guardian.run_health_monitor(shutdown_rx).await })
        };

        store.set_available(false);
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(guardian.state(), ConnectionState::Disconnected);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn delays_never_decrease_and_never_exceed_max(
                base_ms in 1u64..5_000,
                extra_ms in 0u64..120_000,
                attempts in 1usize..40,
            ) {
                let max = Duration::from_millis(base_ms + extra_ms);
                let mut backoff = ExponentialBackoff::new(Duration::from_millis(base_ms), max);

                let mut previous = Duration::ZERO;
                for _ in 0..attempts {
                    let delay = backoff.next_delay();
                    prop_assert!(delay >= previous);
                    prop_assert!(delay <= max);
                    previous = delay;
                }

                backoff.reset();
                prop_assert_eq!(backoff.next_delay(), Duration::from_millis(base_ms));
            }
        }
    }
}
