//! Conversion engine: keypad amount, direction and conversion.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};
use trcalc_common::{now, round_to_u64, Amount, CurrencyCode, Modifier, Timestamp};
use trcalc_fx::RateCache;
use trcalc_history::{HistoryEntry, HistoryLog};

/// The displayed amount and its converted counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub displayed_amount: Amount,
    pub converted_amount: u64,
}

/// Owns the in-progress amount and conversion direction.
///
/// Not reversed converts USD into the target currency; reversed converts
/// the target currency into USD. The amount is never persisted.
pub struct ConversionEngine {
    rates: Arc<RateCache>,
    amount: Amount,
    target: CurrencyCode,
    reversed: bool,
}

impl ConversionEngine {
    pub fn new(rates: Arc<RateCache>, target: CurrencyCode, reversed: bool) -> Self {
        Self {
            rates,
            amount: Amount::ZERO,
            target,
            reversed,
        }
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn target(&self) -> CurrencyCode {
        self.target
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn set_target(&mut self, target: CurrencyCode) {
        self.target = target;
    }

    /// Currency the amount is entered in.
    pub fn from_currency(&self) -> CurrencyCode {
        if self.reversed {
            self.target
        } else {
            CurrencyCode::Usd
        }
    }

    /// Currency the amount is converted into.
    pub fn to_currency(&self) -> CurrencyCode {
        if self.reversed {
            CurrencyCode::Usd
        } else {
            self.target
        }
    }

    /// Shift in a digit. Returns `false` (and keeps the amount) when the
    /// result would exceed the cap.
    pub fn append_digit(&mut self, digit: u8) -> bool {
        match self.amount.push_digit(digit) {
            Some(amount) => {
                self.amount = amount;
                true
            }
            None => {
                debug!(amount = %self.amount, digit, "Ignoring keystroke");
                false
            }
        }
    }

    pub fn backspace(&mut self) {
        self.amount = self.amount.drop_digit();
    }

    pub fn clear(&mut self) {
        self.amount = Amount::ZERO;
    }

    /// Apply a modifier to the in-progress amount. Nothing is recorded.
    pub fn apply_multiplier(&mut self, modifier: &Modifier) {
        if self.amount.is_zero() {
            return;
        }
        let adjusted = modifier.apply(self.amount);
        debug!(from = %self.amount, to = %adjusted, %modifier, "Applied multiplier");
        self.amount = adjusted;
    }

    pub fn select_quick_value(&mut self, value: Amount) {
        self.amount = value;
    }

    /// Flip the direction. The amount keeps its numeric value.
    pub fn swap_direction(&mut self) {
        self.reversed = !self.reversed;
    }

    pub fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
    }

    /// Factor from `from_currency` to `to_currency`.
    pub fn effective_rate(&self) -> Decimal {
        self.directed_rate(self.rates.get_rate(self.target))
    }

    fn directed_rate(&self, target_rate: Decimal) -> Decimal {
        if self.reversed {
            Decimal::ONE.checked_div(target_rate).unwrap_or(Decimal::ONE)
        } else {
            target_rate
        }
    }

    /// Convert `input` in the current direction.
    ///
    /// Reversed conversions divide by the target rate so that e.g.
    /// 3450 TRY at 34.5 gives exactly 100 USD.
    pub fn convert(&self, input: Amount) -> u64 {
        self.convert_at(self.rates.get_rate(self.target), input)
    }

    /// Convert `input` at a target rate already read from the cache.
    /// Overflow saturates in both directions.
    fn convert_at(&self, target_rate: Decimal, input: Amount) -> u64 {
        let value = input.to_decimal();
        let converted = if self.reversed {
            value.checked_div(target_rate).unwrap_or(Decimal::MAX)
        } else {
            value.checked_mul(target_rate).unwrap_or(Decimal::MAX)
        };
        round_to_u64(converted)
    }

    pub fn current_conversion(&self) -> Conversion {
        Conversion {
            displayed_amount: self.amount,
            converted_amount: self.convert(self.amount),
        }
    }

    /// Build a history entry for the current amount without touching any
    /// state. `None` when the amount is zero.
    pub fn snapshot_entry(
        &self,
        modifier: Option<Modifier>,
        at: Timestamp,
    ) -> Option<HistoryEntry> {
        if self.amount.is_zero() {
            return None;
        }
        let input = match &modifier {
            Some(m) => m.apply(self.amount),
            None => self.amount,
        };
        // One read: output and rate_used must agree even if a refresh lands.
        let target_rate = self.rates.get_rate(self.target);
        Some(HistoryEntry::new(
            input,
            self.convert_at(target_rate, input),
            self.from_currency(),
            self.to_currency(),
            self.directed_rate(target_rate),
            modifier,
            at,
        ))
    }

    /// Record the current conversion and reset the amount. No-op on zero.
    pub fn commit_equals(
        &mut self,
        history: &mut HistoryLog,
        modifier: Option<Modifier>,
    ) -> Option<HistoryEntry> {
        let entry = self.snapshot_entry(modifier, now())?;
        info!(
            id = %entry.id,
            input = %entry.input_amount,
            output = entry.output_amount,
            from = %entry.from_currency,
            to = %entry.to_currency,
            "Conversion committed"
        );
        history.append(entry.clone());
        self.amount = Amount::ZERO;
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;
    use trcalc_common::MAX_AMOUNT;
    use trcalc_fx::{MockRateProvider, RateCacheConfig, RateSnapshot};

    fn engine_with_try(rate: Decimal) -> ConversionEngine {
        let rates = BTreeMap::from([(CurrencyCode::Usd, Decimal::ONE), (CurrencyCode::Try, rate)]);
        let cache = RateCache::with_snapshot(
            Arc::new(MockRateProvider::new("test")),
            RateSnapshot::new(rates, now()),
            RateCacheConfig::default(),
        );
        ConversionEngine::new(Arc::new(cache), CurrencyCode::Try, false)
    }

    fn type_digits(engine: &mut ConversionEngine, digits: &str) {
        for c in digits.chars() {
            engine.append_digit(c.to_digit(10).unwrap() as u8);
        }
    }

    #[test]
    fn test_usd_to_try() {
        let mut engine = engine_with_try(dec!(34.5));
        type_digits(&mut engine, "100");

        let conversion = engine.current_conversion();
        assert_eq!(conversion.displayed_amount.value(), 100);
        assert_eq!(conversion.converted_amount, 3450);
    }

    #[test]
    fn test_try_to_usd_divides() {
        let mut engine = engine_with_try(dec!(34.5));
        engine.swap_direction();
        type_digits(&mut engine, "3450");

        assert_eq!(engine.from_currency(), CurrencyCode::Try);
        assert_eq!(engine.to_currency(), CurrencyCode::Usd);
        assert_eq!(engine.current_conversion().converted_amount, 100);
    }

    #[test]
    fn test_digit_cap() {
        let mut engine = engine_with_try(dec!(34.5));
        type_digits(&mut engine, "999999999");
        assert!(!engine.append_digit(9));
        assert_eq!(engine.amount().value(), MAX_AMOUNT);
    }

    #[test]
    fn test_backspace_on_zero() {
        let mut engine = engine_with_try(dec!(34.5));
        engine.backspace();
        engine.append_digit(7);
        assert_eq!(engine.amount().value(), 7);
    }

    #[test]
    fn test_apply_multiplier() {
        let mut engine = engine_with_try(dec!(34.5));
        engine.apply_multiplier(&Modifier::new("+KDV", 18));
        assert!(engine.amount().is_zero());

        type_digits(&mut engine, "100");
        engine.apply_multiplier(&Modifier::new("+KDV", 18));
        assert_eq!(engine.amount().value(), 118);
        engine.apply_multiplier(&Modifier::new("-KDV", -18));
        assert_eq!(engine.amount().value(), 100);
    }

    #[test]
    fn test_swap_twice_keeps_amount() {
        let mut engine = engine_with_try(dec!(34.5));
        type_digits(&mut engine, "42");
        engine.swap_direction();
        engine.swap_direction();
        assert!(!engine.is_reversed());
        assert_eq!(engine.amount().value(), 42);
    }

    #[test]
    fn test_commit_equals() {
        let mut engine = engine_with_try(dec!(34.5));
        let mut history = HistoryLog::new();

        assert!(engine.commit_equals(&mut history, None).is_none());
        assert!(history.is_empty());

        type_digits(&mut engine, "100");
        let entry = engine
            .commit_equals(&mut history, Some(Modifier::new("+KDV", 18)))
            .unwrap();

        assert_eq!(entry.input_amount.value(), 118);
        assert_eq!(entry.output_amount, 4071);
        assert_eq!(entry.rate_used, dec!(34.5));
        assert_eq!(entry.modifier, Some(Modifier::new("+KDV", 18)));
        assert_eq!(history.len(), 1);
        assert!(engine.amount().is_zero());
    }

    #[test]
    fn test_reversed_rate_used_is_reciprocal() {
        let mut engine = engine_with_try(dec!(40));
        let mut history = HistoryLog::new();
        engine.swap_direction();
        type_digits(&mut engine, "80");

        let entry = engine.commit_equals(&mut history, None).unwrap();
        assert_eq!(entry.output_amount, 2);
        assert_eq!(entry.rate_used, dec!(0.025));
    }

    #[test]
    fn test_fifty_one_commits_keep_fifty() {
        let mut engine = engine_with_try(dec!(34.5));
        let mut history = HistoryLog::new();
        for i in 1..=51 {
            engine.select_quick_value(Amount::saturating(i));
            engine.commit_equals(&mut history, None);
        }
        assert_eq!(history.len(), 50);
        assert_eq!(history.latest().unwrap().input_amount.value(), 51);
        assert_eq!(history.iter().last().unwrap().input_amount.value(), 2);
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        let mut engine = engine_with_try(dec!(0.5));
        engine.select_quick_value(Amount::saturating(3));
        assert_eq!(engine.current_conversion().converted_amount, 2);
    }

    #[test]
    fn test_convert_at_ignores_cached_rate() {
        let mut engine = engine_with_try(dec!(34.5));
        assert_eq!(engine.convert_at(dec!(40), Amount::saturating(100)), 4000);
        engine.swap_direction();
        assert_eq!(engine.convert_at(dec!(40), Amount::saturating(100)), 3);
    }

    #[test]
    fn test_entry_output_matches_rate_used() {
        for reversed in [false, true] {
            let mut engine = engine_with_try(dec!(36.7));
            engine.set_reversed(reversed);
            engine.select_quick_value(Amount::saturating(1234));

            let entry = engine.snapshot_entry(None, now()).unwrap();
            let expected = round_to_u64(entry.input_amount.to_decimal() * entry.rate_used);
            assert!(entry.output_amount.abs_diff(expected) <= 1);
            assert_eq!(entry.output_amount, engine.convert(entry.input_amount));
        }
    }

    #[test]
    fn test_reversed_overflow_saturates() {
        let mut engine = engine_with_try(dec!(0.0000000000000000000000000001));
        engine.swap_direction();
        engine.select_quick_value(Amount::saturating(MAX_AMOUNT));
        assert_eq!(engine.current_conversion().converted_amount, u64::MAX);
    }

    proptest! {
        #[test]
        fn prop_digits_never_exceed_cap(digits in proptest::collection::vec(0u8..10, 0..20)) {
            let mut engine = engine_with_try(dec!(34.5));
            for d in digits {
                engine.append_digit(d);
                prop_assert!(engine.amount().value() <= MAX_AMOUNT);
            }
        }
    }
}
