//! Calculator session: the shared handle that serializes events.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use trcalc_common::store::{load_or_default, save_versioned, Versioned};
use trcalc_common::{
    now, Amount, CurrencyCode, FileStore, KeyValueStore, MemoryStore, Modifier, Result,
    TrcalcError,
};
use trcalc_fx::{
    http_client, FallbackRateProvider, HttpRateProvider, OpenExchangeRatesProvider, RateCache,
    RateCacheConfig, RateProvider, RefreshOutcome, WithFallback,
};
use trcalc_history::{HistoryEntry, HistoryLog};

use crate::config::{CalculatorConfig, RateSource};
use crate::display::DisplayView;
use crate::engine::ConversionEngine;
use crate::focus::{FocusResetCoordinator, FocusState};
use crate::settings::Settings;

/// Build the rate provider described by the configuration. Upstream
/// providers are wrapped so that failures yield the fallback table.
pub fn rate_provider(config: &CalculatorConfig) -> Result<Arc<dyn RateProvider>> {
    let client = || {
        http_client(config.request_timeout)
            .map_err(|e| TrcalcError::Configuration(format!("HTTP client: {e}")))
    };
    let provider: Arc<dyn RateProvider> = match &config.rate_source {
        RateSource::OpenExchangeRates { app_id } => Arc::new(WithFallback::new(
            OpenExchangeRatesProvider::new(client()?, app_id.clone()),
        )),
        RateSource::Endpoint { url } => {
            Arc::new(WithFallback::new(HttpRateProvider::new(client()?, url.clone())))
        }
        RateSource::Fallback => Arc::new(FallbackRateProvider),
    };
    Ok(provider)
}

/// Open the store described by the configuration.
pub fn open_store(config: &CalculatorConfig) -> Result<Arc<dyn KeyValueStore>> {
    match &config.data_dir {
        Some(dir) => Ok(Arc::new(FileStore::open(dir)?)),
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

struct SessionState {
    engine: ConversionEngine,
    history: HistoryLog,
    focus: FocusResetCoordinator,
    settings: Settings,
}

impl SessionState {
    fn view(&self, rates: &RateCache) -> DisplayView {
        DisplayView::build(
            &self.engine,
            rates,
            self.settings.auto_reset,
            self.focus.state(),
            self.history.len(),
            now(),
        )
    }
}

/// Shared calculator handle.
///
/// Clones share the same state. Each event runs under one lock, reads live
/// state, persists whatever record it changed and publishes a fresh
/// [`DisplayView`].
#[derive(Clone)]
pub struct Calculator {
    state: Arc<Mutex<SessionState>>,
    rates: Arc<RateCache>,
    store: Arc<dyn KeyValueStore>,
    views: Arc<watch::Sender<DisplayView>>,
}

impl Calculator {
    /// Open a session from configuration.
    pub fn open(config: &CalculatorConfig) -> Result<Self> {
        config.validate()?;
        let store = open_store(config)?;
        let provider = rate_provider(config)?;
        info!(
            provider = provider.name(),
            data_dir = ?config.data_dir,
            "Opening calculator session"
        );
        Ok(Self::with_parts(store, provider, config.rate_cache.clone()))
    }

    /// Assemble a session from a store and a provider, restoring settings,
    /// history and the rate snapshot from the store.
    pub fn with_parts(
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn RateProvider>,
        cache_config: RateCacheConfig,
    ) -> Self {
        let settings: Settings = load_or_default(store.as_ref());
        let history: HistoryLog = load_or_default(store.as_ref());
        let rates = Arc::new(RateCache::load(provider, store.clone(), cache_config));
        let engine = ConversionEngine::new(
            rates.clone(),
            settings.target_currency,
            settings.is_reversed,
        );
        debug!(
            target = %settings.target_currency,
            history = history.len(),
            "Restored session state"
        );

        let state = SessionState {
            engine,
            history,
            focus: FocusResetCoordinator::new(),
            settings,
        };
        let (views, _) = watch::channel(state.view(&rates));

        Self {
            state: Arc::new(Mutex::new(state)),
            rates,
            store,
            views: Arc::new(views),
        }
    }

    /// Spawn one rate refresh if the loaded snapshot is stale.
    pub fn start(&self) -> Option<JoinHandle<RefreshOutcome>> {
        if !self.rates.is_stale(now()) {
            debug!("Rates are fresh at start-up");
            return None;
        }
        let session = self.clone();
        Some(tokio::spawn(async move { session.refresh_rates().await }))
    }

    /// Refresh rates now. The session lock is not held while fetching.
    #[instrument(skip(self))]
    pub async fn refresh_rates(&self) -> RefreshOutcome {
        let outcome = self.rates.refresh().await;
        self.publish();
        outcome
    }

    pub fn press_digit(&self, digit: u8) -> bool {
        self.update(|s| {
            let SessionState { engine, focus, .. } = s;
            focus.on_digit(engine, digit)
        })
    }

    pub fn backspace(&self) {
        self.update(|s| s.engine.backspace())
    }

    pub fn clear(&self) {
        self.update(|s| {
            let SessionState { engine, focus, .. } = s;
            focus.on_clear(engine)
        })
    }

    pub fn apply_multiplier(&self, modifier: &Modifier) {
        self.update(|s| s.engine.apply_multiplier(modifier))
    }

    pub fn select_quick_value(&self, value: Amount) {
        self.update(|s| {
            let SessionState { engine, focus, .. } = s;
            focus.on_quick_value(engine, value)
        })
    }

    /// Flip the conversion direction and remember it.
    pub fn swap_direction(&self) {
        self.update(|s| {
            s.engine.swap_direction();
            s.settings.is_reversed = s.engine.is_reversed();
            self.persist(&s.settings);
        })
    }

    /// Commit the current conversion to history.
    pub fn equals(&self, modifier: Option<Modifier>) -> Option<HistoryEntry> {
        self.update(|s| {
            let entry = s.engine.commit_equals(&mut s.history, modifier)?;
            self.persist(&s.history);
            Some(entry)
        })
    }

    pub fn clear_history(&self) {
        self.update(|s| {
            info!(entries = s.history.len(), "Clearing history");
            s.history.clear();
            self.persist(&s.history);
        })
    }

    /// Visibility changed. Hiding may record the current conversion.
    pub fn visibility_changed(&self, visible: bool) -> Option<HistoryEntry> {
        self.update(|s| {
            if visible {
                s.focus.on_visible();
                return None;
            }
            let auto_reset = s.settings.auto_reset;
            let entry = s.focus.on_hidden(&s.engine, &mut s.history, auto_reset)?;
            self.persist(&s.history);
            Some(entry)
        })
    }

    pub fn toggle_auto_reset(&self) -> bool {
        self.update_settings(|settings| Ok(settings.toggle_auto_reset()))
            .unwrap_or_default()
    }

    pub fn set_target_currency(&self, code: CurrencyCode) -> Result<()> {
        self.update(|s| {
            s.settings.set_target_currency(code)?;
            s.engine.set_target(code);
            self.persist(&s.settings);
            Ok(())
        })
    }

    /// Edit settings. The record is persisted only if `f` succeeds.
    pub fn update_settings<R>(&self, f: impl FnOnce(&mut Settings) -> Result<R>) -> Result<R> {
        self.update(|s| {
            let mut settings = s.settings.clone();
            let out = f(&mut settings)?;
            s.engine.set_target(settings.target_currency);
            s.engine.set_reversed(settings.is_reversed);
            s.settings = settings;
            self.persist(&s.settings);
            Ok(out)
        })
    }

    /// Receive a view after every event.
    pub fn subscribe(&self) -> watch::Receiver<DisplayView> {
        self.views.subscribe()
    }

    /// Current view.
    pub fn view(&self) -> DisplayView {
        self.state.lock().view(&self.rates)
    }

    pub fn amount(&self) -> Amount {
        self.state.lock().engine.amount()
    }

    pub fn focus_state(&self) -> FocusState {
        self.state.lock().focus.state()
    }

    /// History entries, newest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().history.entries()
    }

    pub fn settings(&self) -> Settings {
        self.state.lock().settings.clone()
    }

    pub fn rates(&self) -> &Arc<RateCache> {
        &self.rates
    }

    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.lock();
        let out = f(&mut *state);
        self.views.send_replace(state.view(&self.rates));
        out
    }

    fn publish(&self) {
        let view = self.view();
        self.views.send_replace(view);
    }

    fn persist<T: Versioned>(&self, record: &T) {
        if let Err(e) = save_versioned(self.store.as_ref(), record) {
            warn!(key = T::KEY, code = e.error_code(), error = %e, "Failed to persist record");
        }
    }
}
