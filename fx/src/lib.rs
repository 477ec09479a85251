//! TRCalc FX
//!
//! Exchange-rate acquisition and caching for the calculator.
//!
//! # Features
//!
//! - Pluggable rate providers (Open Exchange Rates, a JSON proxy, static fallback)
//! - A USD-relative rate snapshot that is always complete
//! - Staleness-driven refresh with a soft error flag on failure
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trcalc_fx::{FallbackRateProvider, RateCache};
//! use trcalc_common::{now, CurrencyCode};
//!
//! let cache = Arc::new(RateCache::new(Arc::new(FallbackRateProvider)));
//! if let Some(handle) = cache.refresh_if_stale(now()) {
//!     handle.await?;
//! }
//! let try_rate = cache.get_rate(CurrencyCode::Try);
//! ```

pub mod cache;
pub mod error;
pub mod http;
pub mod provider;
pub mod snapshot;

pub use cache::{RateCache, RateCacheConfig, RefreshOutcome};
pub use error::{FxError, FxResult};
pub use http::{http_client, HttpRateProvider, OpenExchangeRatesProvider};
pub use provider::{FallbackRateProvider, RateProvider, WithFallback};
#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;
pub use snapshot::{fallback_rates, RateSnapshot, RateTable};
