//! Display values computed from calculator state.
//!
//! Views are plain data published to subscribers after every event; the
//! presentation layer renders them without reaching back into the engine.

use rust_decimal::{Decimal, RoundingStrategy};
use trcalc_common::{Amount, CurrencyCode, Timestamp};
use trcalc_fx::RateCache;

use crate::engine::ConversionEngine;
use crate::focus::FocusState;

/// State of the auto-reset toggle as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoResetIndicator {
    Disabled,
    Enabled,
    /// Enabled and a reset is waiting for the next input.
    Armed,
}

impl AutoResetIndicator {
    pub fn new(auto_reset: bool, focus: FocusState) -> Self {
        if !auto_reset {
            AutoResetIndicator::Disabled
        } else if focus.has_pending_reset() {
            AutoResetIndicator::Armed
        } else {
            AutoResetIndicator::Enabled
        }
    }
}

/// Everything the calculator screen shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayView {
    pub from_currency: CurrencyCode,
    pub from_symbol: &'static str,
    pub to_currency: CurrencyCode,
    pub to_symbol: &'static str,
    pub input: String,
    pub output: String,
    pub amount: Amount,
    pub converted: u64,
    /// e.g. `1 USD = 34.50 TRY · 5 min ago`
    pub rate_info: String,
    pub rate_error: Option<String>,
    pub auto_reset: AutoResetIndicator,
    pub history_len: usize,
}

impl DisplayView {
    pub fn build(
        engine: &ConversionEngine,
        rates: &RateCache,
        auto_reset: bool,
        focus: FocusState,
        history_len: usize,
        now: Timestamp,
    ) -> Self {
        let conversion = engine.current_conversion();
        let from = engine.from_currency();
        let to = engine.to_currency();
        Self {
            from_currency: from,
            from_symbol: from.symbol(),
            to_currency: to,
            to_symbol: to.symbol(),
            input: format_grouped(conversion.displayed_amount.value()),
            output: format_grouped(conversion.converted_amount),
            amount: conversion.displayed_amount,
            converted: conversion.converted_amount,
            rate_info: rate_info(rates, engine.target(), now),
            rate_error: rates.last_error(),
            auto_reset: AutoResetIndicator::new(auto_reset, focus),
            history_len,
        }
    }
}

/// Rate line for the target currency, always quoted per 1 USD.
pub fn rate_info(rates: &RateCache, target: CurrencyCode, now: Timestamp) -> String {
    let rate = rates
        .get_rate(target)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let status = if rates.is_loading() {
        "Updating...".to_string()
    } else {
        rates.last_updated_label(now)
    };
    format!("1 USD = {rate:.2} {target} · {status}")
}

/// Group thousands with commas: `1234567` becomes `1,234,567`.
pub fn format_grouped(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Short chip label: `50`, `1k`, `2.5k`, `1.5m`.
pub fn quick_value_label(value: Amount) -> String {
    let raw = value.value();
    let (scaled, suffix) = if raw >= 1_000_000 {
        (Decimal::from(raw) / Decimal::from(1_000_000u64), "m")
    } else if raw >= 1_000 {
        (Decimal::from(raw) / Decimal::from(1_000u64), "k")
    } else {
        return raw.to_string();
    };
    let scaled = scaled
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    format!("{scaled}{suffix}")
}
