//! Exchange-rate cache with a staleness window.
//!
//! The cache always holds a complete snapshot: the persisted one, or the
//! fallback table before the first fetch. Refreshes replace it wholesale on
//! success and leave it untouched on failure. Overlapping refreshes are not
//! serialized; whichever completes last wins.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Duration;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use trcalc_common::store::{load_or_default, save_versioned};
use trcalc_common::time::constants;
use trcalc_common::{minutes_between, now, CurrencyCode, KeyValueStore, Timestamp};

use crate::provider::RateProvider;
use crate::snapshot::RateSnapshot;

/// Configuration for the rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Age at which the snapshot becomes eligible for refresh.
    pub staleness_window: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            staleness_window: constants::rate_staleness_window(),
        }
    }
}

/// Result of a refresh attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The snapshot was replaced.
    Updated(RateSnapshot),
    /// The fetch failed; the previous snapshot is still in place.
    Failed(String),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshOutcome::Updated(_))
    }
}

/// Decrements the in-flight counter even if the refresh future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owns the current rate snapshot.
pub struct RateCache {
    provider: Arc<dyn RateProvider>,
    snapshot: RwLock<RateSnapshot>,
    last_error: RwLock<Option<String>>,
    in_flight: AtomicUsize,
    store: Option<Arc<dyn KeyValueStore>>,
    updates: watch::Sender<RateSnapshot>,
    config: RateCacheConfig,
}

impl RateCache {
    /// Create a cache seeded with the fallback table.
    pub fn new(provider: Arc<dyn RateProvider>) -> Self {
        Self::with_snapshot(provider, RateSnapshot::fallback(), RateCacheConfig::default())
    }

    /// Create a cache seeded with `snapshot`.
    pub fn with_snapshot(
        provider: Arc<dyn RateProvider>,
        snapshot: RateSnapshot,
        config: RateCacheConfig,
    ) -> Self {
        let (updates, _) = watch::channel(snapshot.clone());
        Self {
            provider,
            snapshot: RwLock::new(snapshot),
            last_error: RwLock::new(None),
            in_flight: AtomicUsize::new(0),
            store: None,
            updates,
            config,
        }
    }

    /// Create a cache from the persisted snapshot (or the fallback table if
    /// there is none or it fails validation). Successful refreshes are
    /// written back to `store`.
    pub fn load(
        provider: Arc<dyn RateProvider>,
        store: Arc<dyn KeyValueStore>,
        config: RateCacheConfig,
    ) -> Self {
        let snapshot: RateSnapshot = load_or_default(store.as_ref());
        debug!(
            timestamp = snapshot.timestamp_millis(),
            "Loaded rate snapshot"
        );
        let mut cache = Self::with_snapshot(provider, snapshot, config);
        cache.store = Some(store);
        cache
    }

    /// Rate for `code` in units per 1 USD.
    pub fn get_rate(&self, code: CurrencyCode) -> Decimal {
        self.snapshot.read().rate(code)
    }

    /// Rate for a textual code. Unknown codes get the identity rate.
    pub fn get_rate_by_code(&self, code: &str) -> Decimal {
        match code.parse::<CurrencyCode>() {
            Ok(code) => self.get_rate(code),
            Err(_) => {
                debug!(code, "Unknown currency, using identity rate");
                Decimal::ONE
            }
        }
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> RateSnapshot {
        self.snapshot.read().clone()
    }

    pub fn is_stale(&self, now: Timestamp) -> bool {
        self.snapshot
            .read()
            .is_stale(now, self.config.staleness_window)
    }

    /// Whether at least one refresh is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Message of the most recent failed refresh, cleared when a new
    /// refresh starts.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Receive every snapshot installed from now on.
    pub fn subscribe(&self) -> watch::Receiver<RateSnapshot> {
        self.updates.subscribe()
    }

    /// Fetch a fresh table and install it.
    ///
    /// Never returns an error: a failed fetch is reported through the
    /// outcome and [`last_error`](Self::last_error).
    #[instrument(skip(self), fields(provider = self.provider.name()))]
    pub async fn refresh(&self) -> RefreshOutcome {
        let _guard = InFlight::enter(&self.in_flight);
        *self.last_error.write() = None;

        let table = match self.provider.fetch_rates().await {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "Rate refresh failed, keeping previous snapshot");
                let message = e.to_string();
                *self.last_error.write() = Some(message.clone());
                return RefreshOutcome::Failed(message);
            }
        };

        if let Err(e) = table.validate() {
            warn!(error = %e, "Rejected rate table");
            let message = e.to_string();
            *self.last_error.write() = Some(message.clone());
            return RefreshOutcome::Failed(message);
        }

        let snapshot = RateSnapshot::new(table.rates, now());
        {
            // Install, persist and publish under one guard so the store and
            // subscribers always end up with the snapshot held in memory.
            let mut current = self.snapshot.write();
            *current = snapshot.clone();
            if let Some(store) = &self.store {
                if let Err(e) = save_versioned(store.as_ref(), &snapshot) {
                    warn!(error = %e, "Failed to persist rate snapshot");
                }
            }
            self.updates.send_replace(snapshot.clone());
        }

        info!(
            timestamp = snapshot.timestamp_millis(),
            try_rate = %snapshot.rate(CurrencyCode::Try),
            "Rates refreshed"
        );
        RefreshOutcome::Updated(snapshot)
    }

    /// Spawn one refresh if the snapshot is stale at `now`.
    pub fn refresh_if_stale(
        self: &Arc<Self>,
        now: Timestamp,
    ) -> Option<JoinHandle<RefreshOutcome>> {
        if !self.is_stale(now) {
            debug!("Rate snapshot is fresh, skipping refresh");
            return None;
        }
        let cache = Arc::clone(self);
        Some(tokio::spawn(async move { cache.refresh().await }))
    }

    /// "Never", "Just now", "N min ago" or "N hour(s) ago".
    pub fn last_updated_label(&self, now: Timestamp) -> String {
        let Some(fetched_at) = self.snapshot.read().fetched_at() else {
            return "Never".to_string();
        };
        let minutes = minutes_between(fetched_at, now);
        if minutes < 1 {
            return "Just now".to_string();
        }
        if minutes < 60 {
            return format!("{minutes} min ago");
        }
        let hours = minutes / 60;
        format!("{hours} hour{} ago", if hours > 1 { "s" } else { "" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FxResult;
    use crate::provider::MockRateProvider;
    use crate::snapshot::{fallback_rates, RateTable};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use tokio::sync::Notify;
    use trcalc_common::store::load_versioned;
    use trcalc_common::MemoryStore;

    fn fresh_snapshot(try_rate: Decimal) -> RateSnapshot {
        let mut rates = fallback_rates();
        rates.insert(CurrencyCode::Try, try_rate);
        RateSnapshot::new(rates, now())
    }

    #[test]
    fn test_unknown_code_identity() {
        let cache = RateCache::new(Arc::new(MockRateProvider::new("test")));
        assert_eq!(cache.get_rate_by_code("XYZ"), Decimal::ONE);
        assert_eq!(cache.get_rate_by_code("try"), dec!(34.5));
    }

    #[test]
    fn test_never_fetched_is_stale() {
        let cache = RateCache::new(Arc::new(MockRateProvider::new("test")));
        assert!(cache.is_stale(now()));
        assert_eq!(cache.last_updated_label(now()), "Never");
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let provider = Arc::new(MockRateProvider::new("test"));
        provider.set_rate(CurrencyCode::Try, dec!(38.25));
        provider.set_rate(CurrencyCode::Usd, dec!(2));
        let cache = RateCache::new(provider);
        let mut updates = cache.subscribe();

        let outcome = cache.refresh().await;

        assert!(outcome.is_updated());
        assert_eq!(cache.get_rate(CurrencyCode::Try), dec!(38.25));
        assert_eq!(cache.get_rate(CurrencyCode::Usd), Decimal::ONE);
        assert!(!cache.is_stale(now()));
        assert!(cache.last_error().is_none());
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().rate(CurrencyCode::Try), dec!(38.25));
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_snapshot() {
        let provider = Arc::new(MockRateProvider::new("test"));
        provider.set_failing(true);
        let before = fresh_snapshot(dec!(36.6));
        let cache = RateCache::with_snapshot(provider, before.clone(), RateCacheConfig::default());

        let outcome = cache.refresh().await;

        assert!(matches!(outcome, RefreshOutcome::Failed(_)));
        assert_eq!(cache.snapshot(), before);
        assert_eq!(cache.snapshot().timestamp_millis(), before.timestamp_millis());
        assert!(cache.last_error().unwrap().contains("unavailable"));
        assert!(!cache.is_loading());
    }

    #[tokio::test]
    async fn test_error_cleared_on_next_success() {
        let provider = Arc::new(MockRateProvider::new("test"));
        provider.set_failing(true);
        let cache = RateCache::new(provider.clone());

        cache.refresh().await;
        assert!(cache.last_error().is_some());

        provider.set_failing(false);
        cache.refresh().await;
        assert!(cache.last_error().is_none());
    }

    #[tokio::test]
    async fn test_refresh_persists_to_store() {
        let provider = Arc::new(MockRateProvider::new("test"));
        provider.set_rate(CurrencyCode::Eur, dec!(0.95));
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cache = RateCache::load(provider, store.clone(), RateCacheConfig::default());

        cache.refresh().await;

        let persisted: RateSnapshot = load_versioned(store.as_ref()).unwrap().unwrap();
        assert_eq!(persisted.rate(CurrencyCode::Eur), dec!(0.95));

        // A new cache picks the persisted snapshot up and is not stale.
        let reloaded = RateCache::load(
            Arc::new(MockRateProvider::new("other")),
            store,
            RateCacheConfig::default(),
        );
        assert_eq!(reloaded.get_rate(CurrencyCode::Eur), dec!(0.95));
        assert!(!reloaded.is_stale(now()));
    }

    #[tokio::test]
    async fn test_refresh_if_stale_spawns_once_when_stale() {
        let provider = Arc::new(MockRateProvider::new("test"));
        let cache = Arc::new(RateCache::new(provider.clone()));

        let handle = cache.refresh_if_stale(now()).expect("stale cache refreshes");
        assert!(handle.await.unwrap().is_updated());
        assert!(cache.refresh_if_stale(now()).is_none());
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_last_updated_label() {
        let cache = RateCache::with_snapshot(
            Arc::new(MockRateProvider::new("test")),
            fresh_snapshot(dec!(35)),
            RateCacheConfig::default(),
        );
        let fetched = cache.snapshot().fetched_at().unwrap();

        assert_eq!(cache.last_updated_label(fetched), "Just now");
        assert_eq!(cache.last_updated_label(fetched + Duration::minutes(5)), "5 min ago");
        assert_eq!(cache.last_updated_label(fetched + Duration::minutes(61)), "1 hour ago");
        assert_eq!(cache.last_updated_label(fetched + Duration::hours(3)), "3 hours ago");
    }

    /// First call blocks until released; later calls answer immediately.
    struct GatedProvider {
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateProvider for GatedProvider {
        fn name(&self) -> &str {
            "gated"
        }

        async fn fetch_rates(&self) -> FxResult<RateTable> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let try_rate = if call == 0 {
                self.gate.notified().await;
                dec!(30)
            } else {
                dec!(40)
            };
            let rates = BTreeMap::from([
                (CurrencyCode::Usd, Decimal::ONE),
                (CurrencyCode::Try, try_rate),
            ]);
            Ok(RateTable::new(rates, 0))
        }
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_last_completion_wins() {
        let provider = Arc::new(GatedProvider {
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cache = Arc::new(RateCache::load(
            provider.clone(),
            store.clone(),
            RateCacheConfig::default(),
        ));

        // Issued first, completes last.
        let first = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh().await })
        };
        while provider.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(cache.is_loading());

        // Issued second, completes first.
        cache.refresh().await;
        assert_eq!(cache.get_rate(CurrencyCode::Try), dec!(40));

        provider.gate.notify_one();
        first.await.unwrap();

        assert_eq!(cache.get_rate(CurrencyCode::Try), dec!(30));
        assert!(!cache.is_loading());

        // The store holds what memory holds.
        let persisted: RateSnapshot = load_versioned(store.as_ref()).unwrap().unwrap();
        assert_eq!(persisted, cache.snapshot());
        assert_eq!(*cache.subscribe().borrow(), cache.snapshot());
    }
}
