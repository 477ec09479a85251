//! History entry type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trcalc_common::{minutes_between, Amount, CurrencyCode, EntryId, Modifier};

/// A completed conversion. Created once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Unique entry ID.
    pub id: EntryId,
    /// Amount that was converted, after any modifier.
    pub input_amount: Amount,
    /// Converted amount. Not capped: a large input times a large rate can
    /// exceed the keypad limit.
    pub output_amount: u64,
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
    /// Factor applied to `input_amount`, in `to_currency` per `from_currency`.
    pub rate_used: Decimal,
    /// Modifier applied before converting, if any.
    #[serde(default)]
    pub modifier: Option<Modifier>,
    /// When the conversion was recorded.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Create an entry with a fresh ID.
    pub fn new(
        input_amount: Amount,
        output_amount: u64,
        from_currency: CurrencyCode,
        to_currency: CurrencyCode,
        rate_used: Decimal,
        modifier: Option<Modifier>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntryId::new(),
            input_amount,
            output_amount,
            from_currency,
            to_currency,
            rate_used,
            modifier,
            timestamp,
        }
    }

    /// Compact age: "now", "12m", "3h", "2d".
    pub fn age_label(&self, now: DateTime<Utc>) -> String {
        let minutes = minutes_between(self.timestamp, now);
        if minutes < 1 {
            "now".to_string()
        } else if minutes < 60 {
            format!("{minutes}m")
        } else if minutes < 60 * 24 {
            format!("{}h", minutes / 60)
        } else {
            format!("{}d", minutes / (60 * 24))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use trcalc_common::now;

    fn entry_at(timestamp: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry::new(
            Amount::saturating(100),
            3450,
            CurrencyCode::Usd,
            CurrencyCode::Try,
            dec!(34.5),
            None,
            timestamp,
        )
    }

    #[test]
    fn test_age_label() {
        let at = now();
        let entry = entry_at(at);

        assert_eq!(entry.age_label(at + Duration::seconds(30)), "now");
        assert_eq!(entry.age_label(at + Duration::minutes(12)), "12m");
        assert_eq!(entry.age_label(at + Duration::minutes(185)), "3h");
        assert_eq!(entry.age_label(at + Duration::days(2)), "2d");
        // Clock skew never yields a negative age.
        assert_eq!(entry.age_label(at - Duration::minutes(5)), "now");
    }

    #[test]
    fn test_serialized_shape() {
        let mut entry = entry_at(now());
        entry.modifier = Some(Modifier::new("+KDV", 18));

        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["inputAmount"], 100);
        assert_eq!(json["outputAmount"], 3450);
        assert_eq!(json["fromCurrency"], "USD");
        assert_eq!(json["toCurrency"], "TRY");
        assert_eq!(json["modifier"]["percent"], 18);
        assert!(json["timestamp"].is_i64());

        let back: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, entry.id);
        assert_eq!(back.timestamp.timestamp_millis(), entry.timestamp.timestamp_millis());
    }

    #[test]
    fn test_rejects_over_cap_input() {
        let json = serde_json::json!({
            "id": EntryId::new(),
            "inputAmount": 1_000_000_000u64,
            "outputAmount": 1,
            "fromCurrency": "USD",
            "toCurrency": "TRY",
            "rateUsed": "34.5",
            "modifier": null,
            "timestamp": 1_700_000_000_000i64,
        });
        assert!(serde_json::from_value::<HistoryEntry>(json).is_err());
    }
}
