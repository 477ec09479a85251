//! Rate tables and snapshots.

use std::collections::BTreeMap;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trcalc_common::store::{keys, Versioned};
use trcalc_common::{from_epoch_millis, to_epoch_millis, CurrencyCode, Timestamp};

use crate::error::{FxError, FxResult};

/// Built-in rates used before the first successful fetch and whenever the
/// upstream provider cannot be reached.
pub fn fallback_rates() -> BTreeMap<CurrencyCode, Decimal> {
    BTreeMap::from([
        (CurrencyCode::Usd, Decimal::ONE),
        (CurrencyCode::Eur, Decimal::new(92, 2)),
        (CurrencyCode::Gbp, Decimal::new(79, 2)),
        (CurrencyCode::Try, Decimal::new(345, 1)),
    ])
}

/// Rates as returned by a provider: units of each currency per 1 USD, plus
/// the provider's own epoch-millisecond timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub rates: BTreeMap<CurrencyCode, Decimal>,
    #[serde(default)]
    pub timestamp: i64,
}

impl RateTable {
    pub fn new(rates: BTreeMap<CurrencyCode, Decimal>, timestamp: i64) -> Self {
        Self { rates, timestamp }
    }

    /// The static fallback table stamped with `at`.
    pub fn fallback(at: Timestamp) -> Self {
        Self::new(fallback_rates(), to_epoch_millis(at))
    }

    /// Reject tables with zero or negative rates.
    pub fn validate(&self) -> FxResult<()> {
        if self.rates.is_empty() {
            return Err(FxError::InvalidResponse("rate table is empty".to_string()));
        }
        if let Some((code, rate)) = self.rates.iter().find(|(_, r)| **r <= Decimal::ZERO) {
            return Err(FxError::InvalidResponse(format!(
                "rate for {code} must be positive, got {rate}"
            )));
        }
        Ok(())
    }
}

/// The cached rate table together with when it was fetched.
///
/// `rates[USD]` is always exactly 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RateTable", into = "RateTable")]
pub struct RateSnapshot {
    rates: BTreeMap<CurrencyCode, Decimal>,
    /// Epoch milliseconds, `0` if never fetched.
    timestamp: i64,
}

impl RateSnapshot {
    /// Build a snapshot fetched at `fetched_at`.
    pub fn new(rates: BTreeMap<CurrencyCode, Decimal>, fetched_at: Timestamp) -> Self {
        Self::from_parts(rates, to_epoch_millis(fetched_at))
    }

    fn from_parts(mut rates: BTreeMap<CurrencyCode, Decimal>, timestamp: i64) -> Self {
        rates.insert(CurrencyCode::Usd, Decimal::ONE);
        Self {
            rates,
            timestamp: timestamp.max(0),
        }
    }

    /// Fallback rates, never fetched.
    pub fn fallback() -> Self {
        Self::from_parts(fallback_rates(), 0)
    }

    /// Rate for `code`; identity when the table has no entry for it.
    pub fn rate(&self, code: CurrencyCode) -> Decimal {
        self.rates.get(&code).copied().unwrap_or(Decimal::ONE)
    }

    pub fn rates(&self) -> &BTreeMap<CurrencyCode, Decimal> {
        &self.rates
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp
    }

    /// When the snapshot was fetched, `None` if it never was.
    pub fn fetched_at(&self) -> Option<Timestamp> {
        from_epoch_millis(self.timestamp)
    }

    /// Stale when never fetched or at least `window` old.
    pub fn is_stale(&self, now: Timestamp, window: Duration) -> bool {
        match self.fetched_at() {
            None => true,
            Some(fetched_at) => now - fetched_at >= window,
        }
    }
}

impl Default for RateSnapshot {
    fn default() -> Self {
        Self::fallback()
    }
}

impl TryFrom<RateTable> for RateSnapshot {
    type Error = FxError;

    fn try_from(table: RateTable) -> Result<Self, Self::Error> {
        table.validate()?;
        Ok(Self::from_parts(table.rates, table.timestamp))
    }
}

impl From<RateSnapshot> for RateTable {
    fn from(snapshot: RateSnapshot) -> Self {
        RateTable::new(snapshot.rates, snapshot.timestamp)
    }
}

impl Versioned for RateSnapshot {
    const KEY: &'static str = keys::RATES;
    const VERSION: u32 = 1;
}
