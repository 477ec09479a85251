//! Visibility-driven reset of the in-progress amount.
//!
//! When the app is hidden with auto-reset on and a non-zero amount, the
//! current conversion is recorded immediately but the amount stays on
//! screen. Coming back arms the reset; the next digit, quick value or
//! explicit clear then starts from zero.
//!
//! ```text
//! Active --hide [autoReset && amount > 0] / snapshot--> BackgroundedPendingReset
//! BackgroundedPendingReset --show--> ResetArmed
//! ResetArmed --digit | quick value | clear / zero amount--> Active
//! ```

use tracing::{debug, info};
use trcalc_common::{now, Amount};
use trcalc_history::{HistoryEntry, HistoryLog};

use crate::engine::ConversionEngine;

/// Focus reset state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FocusState {
    /// Normal input.
    #[default]
    Active,
    /// Hidden after recording the current conversion.
    BackgroundedPendingReset,
    /// Visible again; the next input starts from zero.
    ResetArmed,
}

impl FocusState {
    /// Whether the next input clears the amount first.
    pub fn has_pending_reset(&self) -> bool {
        !matches!(self, FocusState::Active)
    }
}

/// Reacts to visibility changes and gates input on a pending reset.
///
/// Every handler takes the live engine and history so that decisions use
/// the state at the moment of the event.
#[derive(Debug, Default)]
pub struct FocusResetCoordinator {
    state: FocusState,
}

impl FocusResetCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FocusState {
        self.state
    }

    /// The app was hidden. Records at most one entry per excursion.
    pub fn on_hidden(
        &mut self,
        engine: &ConversionEngine,
        history: &mut HistoryLog,
        auto_reset: bool,
    ) -> Option<HistoryEntry> {
        if self.state != FocusState::Active {
            debug!(state = ?self.state, "Already backgrounded");
            return None;
        }
        if !auto_reset {
            return None;
        }

        let entry = engine.snapshot_entry(None, now())?;
        info!(
            id = %entry.id,
            input = %entry.input_amount,
            output = entry.output_amount,
            "Snapshotted conversion on hide"
        );
        history.append(entry.clone());
        self.state = FocusState::BackgroundedPendingReset;
        Some(entry)
    }

    /// The app became visible again.
    pub fn on_visible(&mut self) {
        if self.state == FocusState::BackgroundedPendingReset {
            debug!("Reset armed");
            self.state = FocusState::ResetArmed;
        }
    }

    /// Consume a pending reset before an input event. Returns whether the
    /// amount was zeroed.
    pub fn take_pending_reset(&mut self, engine: &mut ConversionEngine) -> bool {
        if !self.state.has_pending_reset() {
            return false;
        }
        debug!(amount = %engine.amount(), "Applying deferred reset");
        engine.clear();
        self.state = FocusState::Active;
        true
    }

    pub fn on_digit(&mut self, engine: &mut ConversionEngine, digit: u8) -> bool {
        self.take_pending_reset(engine);
        engine.append_digit(digit)
    }

    pub fn on_quick_value(&mut self, engine: &mut ConversionEngine, value: Amount) {
        self.take_pending_reset(engine);
        engine.select_quick_value(value);
    }

    pub fn on_clear(&mut self, engine: &mut ConversionEngine) {
        self.take_pending_reset(engine);
        engine.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use trcalc_common::CurrencyCode;
    use trcalc_fx::{MockRateProvider, RateCache, RateCacheConfig, RateSnapshot};

    fn engine() -> ConversionEngine {
        let rates = BTreeMap::from([(CurrencyCode::Try, dec!(34.5))]);
        let cache = RateCache::with_snapshot(
            Arc::new(MockRateProvider::new("test")),
            RateSnapshot::new(rates, now()),
            RateCacheConfig::default(),
        );
        ConversionEngine::new(Arc::new(cache), CurrencyCode::Try, false)
    }

    #[test]
    fn test_background_excursion() {
        let mut engine = engine();
        let mut history = HistoryLog::new();
        let mut focus = FocusResetCoordinator::new();
        engine.select_quick_value(Amount::saturating(200));

        let entry = focus.on_hidden(&engine, &mut history, true).unwrap();
        assert_eq!(entry.input_amount.value(), 200);
        assert_eq!(entry.output_amount, 6900);
        assert_eq!(history.len(), 1);
        assert_eq!(engine.amount().value(), 200);
        assert_eq!(focus.state(), FocusState::BackgroundedPendingReset);

        focus.on_visible();
        assert_eq!(focus.state(), FocusState::ResetArmed);
        assert_eq!(engine.amount().value(), 200);

        focus.on_digit(&mut engine, 5);
        assert_eq!(engine.amount().value(), 5);
        assert_eq!(focus.state(), FocusState::Active);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_repeated_hide_snapshots_once() {
        let mut engine = engine();
        let mut history = HistoryLog::new();
        let mut focus = FocusResetCoordinator::new();
        engine.select_quick_value(Amount::saturating(10));

        focus.on_hidden(&engine, &mut history, true);
        assert!(focus.on_hidden(&engine, &mut history, true).is_none());
        focus.on_visible();
        assert!(focus.on_hidden(&engine, &mut history, true).is_none());

        assert_eq!(history.len(), 1);
        assert_eq!(focus.state(), FocusState::ResetArmed);
    }

    #[test]
    fn test_hide_without_auto_reset_or_amount() {
        let mut engine = engine();
        let mut history = HistoryLog::new();
        let mut focus = FocusResetCoordinator::new();

        assert!(focus.on_hidden(&engine, &mut history, true).is_none());
        engine.select_quick_value(Amount::saturating(10));
        assert!(focus.on_hidden(&engine, &mut history, false).is_none());

        assert!(history.is_empty());
        assert_eq!(focus.state(), FocusState::Active);
    }

    #[test]
    fn test_armed_reset_consumed_by_quick_value() {
        let mut engine = engine();
        let mut history = HistoryLog::new();
        let mut focus = FocusResetCoordinator::new();
        engine.select_quick_value(Amount::saturating(300));

        focus.on_hidden(&engine, &mut history, true);
        focus.on_visible();
        // Input handlers never look at auto-reset, so the armed reset applies
        // whatever the setting is by now.
        focus.on_quick_value(&mut engine, Amount::saturating(50));

        assert_eq!(engine.amount().value(), 50);
        assert_eq!(focus.state(), FocusState::Active);
    }

    #[test]
    fn test_clear_consumes_armed_reset() {
        let mut engine = engine();
        let mut history = HistoryLog::new();
        let mut focus = FocusResetCoordinator::new();
        engine.select_quick_value(Amount::saturating(300));

        focus.on_hidden(&engine, &mut history, true);
        focus.on_visible();
        focus.on_clear(&mut engine);

        assert!(engine.amount().is_zero());
        assert_eq!(focus.state(), FocusState::Active);
    }

    #[test]
    fn test_input_while_backgrounded_consumes_reset() {
        let mut engine = engine();
        let mut history = HistoryLog::new();
        let mut focus = FocusResetCoordinator::new();
        engine.select_quick_value(Amount::saturating(300));

        focus.on_hidden(&engine, &mut history, true);
        focus.on_digit(&mut engine, 4);

        assert_eq!(engine.amount().value(), 4);
        assert_eq!(focus.state(), FocusState::Active);
    }
}
