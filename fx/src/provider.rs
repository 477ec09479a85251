//! Rate provider traits and implementations.

use async_trait::async_trait;
use tracing::{debug, warn};
use trcalc_common::now;

use crate::error::FxResult;
use crate::snapshot::RateTable;

/// Trait for exchange-rate sources.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fetch the full USD-relative rate table in one request.
    async fn fetch_rates(&self) -> FxResult<RateTable>;
}

/// Always answers with the built-in table, stamped with the current time.
///
/// Used when no upstream is configured.
#[derive(Debug, Default, Clone)]
pub struct FallbackRateProvider;

#[async_trait]
impl RateProvider for FallbackRateProvider {
    fn name(&self) -> &str {
        "FALLBACK"
    }

    async fn fetch_rates(&self) -> FxResult<RateTable> {
        Ok(RateTable::fallback(now()))
    }
}

/// Wraps a provider so that any failure is answered with the fallback
/// table and a fresh timestamp instead of an error.
pub struct WithFallback<P> {
    inner: P,
}

impl<P: RateProvider> WithFallback<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: RateProvider> RateProvider for WithFallback<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch_rates(&self) -> FxResult<RateTable> {
        match self.inner.fetch_rates().await {
            Ok(table) => {
                debug!(provider = self.inner.name(), "Got rates from provider");
                Ok(table)
            }
            Err(e) => {
                warn!(
                    provider = self.inner.name(),
                    error = %e,
                    "Provider failed, substituting fallback rates"
                );
                Ok(RateTable::fallback(now()))
            }
        }
    }
}

/// Mock rate provider for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateProvider {
    name: String,
    rates: parking_lot::Mutex<
        std::collections::BTreeMap<trcalc_common::CurrencyCode, rust_decimal::Decimal>,
    >,
    failing: std::sync::atomic::AtomicBool,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateProvider {
    /// Create a new mock provider serving the fallback table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rates: parking_lot::Mutex::new(crate::snapshot::fallback_rates()),
            failing: std::sync::atomic::AtomicBool::new(false),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set the rate served for a currency.
    pub fn set_rate(&self, code: trcalc_common::CurrencyCode, rate: rust_decimal::Decimal) {
        self.rates.lock().insert(code, rate);
    }

    /// Make subsequent fetches fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of fetches performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_rates(&self) -> FxResult<RateTable> {
        use std::sync::atomic::Ordering;

        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(crate::error::FxError::ProviderError(format!(
                "{} is unavailable",
                self.name
            )));
        }
        Ok(RateTable::new(
            self.rates.lock().clone(),
            trcalc_common::to_epoch_millis(now()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fallback_rates;
    use rust_decimal_macros::dec;
    use trcalc_common::CurrencyCode;

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockRateProvider::new("test");
        provider.set_rate(CurrencyCode::Try, dec!(36.2));

        let table = provider.fetch_rates().await.unwrap();

        assert_eq!(table.rates[&CurrencyCode::Try], dec!(36.2));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_fallback_provider_stamps_now() {
        let before = trcalc_common::to_epoch_millis(now());
        let table = FallbackRateProvider.fetch_rates().await.unwrap();

        assert_eq!(table.rates, fallback_rates());
        assert!(table.timestamp >= before);
    }

    #[tokio::test]
    async fn test_with_fallback_masks_failure() {
        let inner = MockRateProvider::new("flaky");
        inner.set_rate(CurrencyCode::Try, dec!(40));
        inner.set_failing(true);
        let provider = WithFallback::new(inner);

        let table = provider.fetch_rates().await.unwrap();

        assert_eq!(table.rates[&CurrencyCode::Try], dec!(34.5));
        assert!(table.timestamp > 0);
        assert_eq!(provider.inner().calls(), 1);
    }

    #[tokio::test]
    async fn test_with_fallback_passes_through_success() {
        let inner = MockRateProvider::new("ok");
        inner.set_rate(CurrencyCode::Try, dec!(40));
        let provider = WithFallback::new(inner);

        let table = provider.fetch_rates().await.unwrap();

        assert_eq!(table.rates[&CurrencyCode::Try], dec!(40));
        assert_eq!(provider.name(), "ok");
    }
}
