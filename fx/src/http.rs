//! HTTP rate providers.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};
use trcalc_common::{now, to_epoch_millis, CurrencyCode};

use crate::error::{FxError, FxResult};
use crate::provider::RateProvider;
use crate::snapshot::{fallback_rates, RateTable};

const UA: &str = concat!("trcalc/", env!("CARGO_PKG_VERSION"));

/// Default Open Exchange Rates API root.
pub const OPEN_EXCHANGE_RATES_URL: &str = "https://openexchangerates.org/api";

/// Build the shared HTTP client.
pub fn http_client(timeout: Duration) -> FxResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(UA)
        .build()?;
    Ok(client)
}

async fn get_json<T: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> FxResult<T> {
    let resp = client.get(url).query(query).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FxError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(resp.json::<T>().await?)
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    rates: HashMap<String, Decimal>,
}

/// Fetches `latest.json` from Open Exchange Rates.
///
/// Currencies missing from the response are filled in from the fallback
/// table. Transport and status failures are returned as errors; wrap the
/// provider in [`WithFallback`](crate::provider::WithFallback) to mask them.
pub struct OpenExchangeRatesProvider {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
}

impl OpenExchangeRatesProvider {
    pub fn new(client: reqwest::Client, app_id: impl Into<String>) -> Self {
        Self {
            client,
            base_url: OPEN_EXCHANGE_RATES_URL.to_string(),
            app_id: app_id.into(),
        }
    }

    /// Point at a different API root (mirrors, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn symbols() -> String {
        CurrencyCode::ALL
            .iter()
            .map(|c| c.code())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Merge an upstream rate map over the fallback table.
pub(crate) fn merge_with_fallback(
    upstream: &HashMap<String, Decimal>,
) -> BTreeMap<CurrencyCode, Decimal> {
    let mut rates = fallback_rates();
    for code in CurrencyCode::targets() {
        if let Some(rate) = upstream.get(code.code()).filter(|r| **r > Decimal::ZERO) {
            rates.insert(code, *rate);
        }
    }
    rates.insert(CurrencyCode::Usd, Decimal::ONE);
    rates
}

#[async_trait]
impl RateProvider for OpenExchangeRatesProvider {
    fn name(&self) -> &str {
        "OPEN_EXCHANGE_RATES"
    }

    #[instrument(skip(self), fields(provider = "OPEN_EXCHANGE_RATES"))]
    async fn fetch_rates(&self) -> FxResult<RateTable> {
        let url = format!("{}/latest.json", self.base_url);
        let symbols = Self::symbols();
        let body: LatestResponse = get_json(
            &self.client,
            &url,
            &[("app_id", self.app_id.as_str()), ("symbols", symbols.as_str())],
        )
        .await?;

        debug!(currencies = body.rates.len(), "Received upstream rates");
        Ok(RateTable::new(
            merge_with_fallback(&body.rates),
            to_epoch_millis(now()),
        ))
    }
}

/// Fetches a `{ "rates": {...}, "timestamp": ms }` table from a rate proxy.
pub struct HttpRateProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpRateProvider {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    rates: HashMap<String, Decimal>,
    #[serde(default)]
    timestamp: i64,
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        "HTTP"
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_rates(&self) -> FxResult<RateTable> {
        let body: ProxyResponse = get_json(&self.client, &self.url, &[]).await?;

        let rates: BTreeMap<CurrencyCode, Decimal> = body
            .rates
            .iter()
            .filter_map(|(code, rate)| code.parse::<CurrencyCode>().ok().map(|c| (c, *rate)))
            .collect();
        let table = RateTable::new(rates, body.timestamp);
        table.validate()?;
        Ok(table)
    }
}
