use cached_fetch::{FetchPolicy, FetchResult, Provenance, ResilientFetcher};
use serde_json::Value;

use crate::error::MarketDataError;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Daily USD price, market cap, and volume series for one asset.
#[derive(Debug, Clone)]
pub struct MarketChart {
    pub prices: Vec<f64>,
    pub market_caps: Vec<f64>,
    pub total_volumes: Vec<f64>,
    pub provenance: Provenance,
}

pub struct CoinGeckoClient {
    fetcher: ResilientFetcher,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(fetcher: ResilientFetcher) -> Self {
        Self::with_base_url(fetcher, BASE_URL)
    }

    /// Same client against a different host, mainly for tests.
    pub fn with_base_url(fetcher: ResilientFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    /// GET /coins/{asset}/market_chart: `days` days of daily series.
    pub async fn market_chart(
        &self,
        asset: &str,
        days: u32,
    ) -> Result<MarketChart, MarketDataError> {
        let url = format!("{}/coins/{asset}/market_chart", self.base_url);
        let query = [
            ("vs_currency", "usd".to_string()),
            ("days", days.to_string()),
        ];
        let cache_key = format!("{asset}_usd_{days}");

        let result = self
            .fetcher
            .fetch_json(
                &url,
                &query,
                "coingecko_market_chart",
                &cache_key,
                &FetchPolicy::with_retries(5),
            )
            .await?;
        let (payload, provenance) = result.into_parts();

        Ok(MarketChart {
            prices: series(&payload, "prices"),
            market_caps: series(&payload, "market_caps"),
            total_volumes: series(&payload, "total_volumes"),
            provenance,
        })
    }

    /// GET /coins/{asset}: full coin document with market, community, and
    /// developer data. Stays untyped; callers pick over what they need.
    pub async fn coin_details(&self, asset: &str) -> Result<FetchResult<Value>, MarketDataError> {
        let url = format!("{}/coins/{asset}", self.base_url);
        let query = [
            ("localization", "false".to_string()),
            ("tickers", "false".to_string()),
            ("market_data", "true".to_string()),
            ("community_data", "true".to_string()),
            ("developer_data", "true".to_string()),
            ("sparkline", "false".to_string()),
        ];
        let cache_key = format!("coin_{asset}");

        Ok(self
            .fetcher
            .fetch_json(
                &url,
                &query,
                "coingecko_coin",
                &cache_key,
                &FetchPolicy::with_retries(5),
            )
            .await?)
    }
}

// Second column of a [[timestamp, value], ...] series, numbers only.
fn series(payload: &Value, field: &str) -> Vec<f64> {
    payload
        .get(field)
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.get(1).and_then(Value::as_f64))
                .collect()
        })
        .unwrap_or_default()
}
