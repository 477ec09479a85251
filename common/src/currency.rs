//! Monetary types for the TRCalc engine.
//!
//! Amounts are bounded integers with no fractional minor units. Rates are
//! decimals, so conversions only round once, at the very end.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest amount the keypad can hold (inclusive).
pub const MAX_AMOUNT: u64 = 999_999_999;

/// Currencies supported by the calculator.
///
/// USD is the pivot: every rate is expressed as units of a currency per 1 USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    Usd,
    Eur,
    Gbp,
    Try,
}

impl CurrencyCode {
    /// Every supported currency, pivot first.
    pub const ALL: [CurrencyCode; 4] = [
        CurrencyCode::Usd,
        CurrencyCode::Eur,
        CurrencyCode::Gbp,
        CurrencyCode::Try,
    ];

    /// ISO 4217 code.
    pub fn code(&self) -> &'static str {
        match self {
            CurrencyCode::Usd => "USD",
            CurrencyCode::Eur => "EUR",
            CurrencyCode::Gbp => "GBP",
            CurrencyCode::Try => "TRY",
        }
    }

    /// Human readable name.
    pub fn name(&self) -> &'static str {
        match self {
            CurrencyCode::Usd => "US Dollar",
            CurrencyCode::Eur => "Euro",
            CurrencyCode::Gbp => "British Pound",
            CurrencyCode::Try => "Turkish Lira",
        }
    }

    /// Display symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            CurrencyCode::Usd => "$",
            CurrencyCode::Eur => "€",
            CurrencyCode::Gbp => "£",
            CurrencyCode::Try => "₺",
        }
    }

    /// Whether this is the pivot currency (USD).
    pub fn is_pivot(&self) -> bool {
        matches!(self, CurrencyCode::Usd)
    }

    /// Currencies that can be picked as a conversion target.
    pub fn targets() -> impl Iterator<Item = CurrencyCode> {
        Self::ALL.into_iter().filter(|c| !c.is_pivot())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Returned when a textual currency code is not one of [`CurrencyCode::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown currency code: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(CurrencyCode::Usd),
            "EUR" => Ok(CurrencyCode::Eur),
            "GBP" => Ok(CurrencyCode::Gbp),
            "TRY" => Ok(CurrencyCode::Try),
            _ => Err(UnknownCurrency(s.to_string())),
        }
    }
}

/// Returned when a value does not fit in an [`Amount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Amount {0} exceeds the maximum of {MAX_AMOUNT}")]
pub struct AmountOutOfRange(pub u64);

/// A keypad amount: a whole number between 0 and [`MAX_AMOUNT`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u64", into = "u64")]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const MAX: Amount = Amount(MAX_AMOUNT);

    /// Create an amount, rejecting values above the cap.
    pub fn new(value: u64) -> Option<Self> {
        (value <= MAX_AMOUNT).then_some(Self(value))
    }

    /// Create an amount, clamping values above the cap.
    pub fn saturating(value: u64) -> Self {
        Self(value.min(MAX_AMOUNT))
    }

    /// Raw integer value.
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Shift in one keypad digit. `None` if the digit is not 0-9 or the
    /// result would exceed the cap.
    pub fn push_digit(&self, digit: u8) -> Option<Self> {
        if digit > 9 {
            return None;
        }
        self.0
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(digit)))
            .and_then(Self::new)
    }

    /// Drop the least significant digit.
    pub fn drop_digit(&self) -> Self {
        Self(self.0 / 10)
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }

    /// Round a non-negative decimal half away from zero and clamp it into
    /// the amount range.
    pub fn from_decimal_rounded(value: Decimal) -> Self {
        Self::saturating(round_to_u64(value))
    }
}

impl TryFrom<u64> for Amount {
    type Error = AmountOutOfRange;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(AmountOutOfRange(value))
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Round half away from zero to a whole number. Negative inputs clamp to 0.
pub fn round_to_u64(value: Decimal) -> u64 {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .unwrap_or(if value.is_sign_negative() { 0 } else { u64::MAX })
}

/// A percentage surcharge or discount applied to an amount before it is
/// converted, e.g. `+KDV 18` or `-KDV -18`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifier {
    /// Short label shown next to the amount.
    pub label: String,
    /// Signed percentage.
    #[serde(alias = "value")]
    pub percent: i32,
}

impl Modifier {
    pub fn new(label: impl Into<String>, percent: i32) -> Self {
        Self {
            label: label.into(),
            percent,
        }
    }

    /// Apply the modifier.
    ///
    /// Positive percentages multiply by `1 + p/100`; zero and negative ones
    /// divide by `1 + |p|/100`, so `-18` undoes a previous `+18`.
    pub fn apply(&self, amount: Amount) -> Amount {
        let percent = Decimal::from(self.percent.unsigned_abs());
        let factor = Decimal::ONE + percent / Decimal::ONE_HUNDRED;
        let adjusted = if self.percent > 0 {
            amount.to_decimal() * factor
        } else {
            amount.to_decimal() / factor
        };
        Amount::from_decimal_rounded(adjusted)
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:+}%)", self.label, self.percent)
    }
}
