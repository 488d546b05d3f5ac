use std::collections::HashMap;

use cached_fetch::{FetchPolicy, FetchResult, Provenance, ResilientFetcher};
use serde_json::{json, Value};

use crate::error::MarketDataError;

const QUERY1_HOST: &str = "https://query1.finance.yahoo.com";
const QUERY2_HOST: &str = "https://query2.finance.yahoo.com";
const SUMMARY_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,financialData,assetProfile";

/// Quote assembled from the 5d/1d chart endpoint, the fallback when the
/// bulk quote endpoint omits a symbol.
#[derive(Debug, Clone)]
pub struct ChartQuote {
    pub price: Option<f64>,
    pub change_24h_pct: Option<f64>,
    pub currency: String,
    /// Epoch seconds as reported by Yahoo, passed through untyped.
    pub market_time: Option<Value>,
    pub provenance: Provenance,
}

pub struct YahooClient {
    fetcher: ResilientFetcher,
    query1: String,
    query2: String,
}

impl YahooClient {
    pub fn new(fetcher: ResilientFetcher) -> Self {
        Self::with_hosts(fetcher, QUERY1_HOST, QUERY2_HOST)
    }

    /// Same client against different hosts, mainly for tests.
    pub fn with_hosts(
        fetcher: ResilientFetcher,
        query1: impl Into<String>,
        query2: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            query1: query1.into(),
            query2: query2.into(),
        }
    }

    /// One v7 bulk quote call for several symbols, indexed by symbol.
    /// Symbols absent from the response are simply missing from the map.
    pub async fn bulk_quotes(
        &self,
        symbols: &[&str],
    ) -> Result<FetchResult<HashMap<String, Value>>, MarketDataError> {
        let joined = symbols.join(",");
        let url = format!("{}/v7/finance/quote", self.query1);
        let query = [("symbols", joined.clone())];
        let cache_key = format!("watchlist_{joined}");

        let result = self
            .fetcher
            .fetch_json(
                &url,
                &query,
                "yahoo_quote",
                &cache_key,
                &FetchPolicy::with_retries(3),
            )
            .await?;
        let (payload, provenance) = result.into_parts();

        Ok(FetchResult {
            payload: index_by_symbol(&payload),
            provenance,
        })
    }

    /// Price and 24h change from the v8 chart endpoint (5 days, daily).
    pub async fn chart_quote(&self, symbol: &str) -> Result<ChartQuote, MarketDataError> {
        let url = format!("{}/v8/finance/chart/{symbol}", self.query1);
        let query = [("range", "5d".to_string()), ("interval", "1d".to_string())];
        let cache_key = format!("chart_{symbol}");

        let result = self
            .fetcher
            .fetch_json(
                &url,
                &query,
                "yahoo_chart",
                &cache_key,
                &FetchPolicy::with_retries(3),
            )
            .await?;
        let (payload, provenance) = result.into_parts();

        Ok(quote_from_chart(&payload, provenance))
    }

    /// quoteSummary.result[0] for the standard module set, untyped.
    pub async fn quote_summary(&self, symbol: &str) -> Result<FetchResult<Value>, MarketDataError> {
        let url = format!("{}/v10/finance/quoteSummary/{symbol}", self.query2);
        let query = [("modules", SUMMARY_MODULES.to_string())];
        let cache_key = format!("summary_{symbol}");

        let result = self
            .fetcher
            .fetch_json(
                &url,
                &query,
                "yahoo_summary",
                &cache_key,
                &FetchPolicy::with_retries(4),
            )
            .await?;
        let (payload, provenance) = result.into_parts();

        let summary = payload
            .get("quoteSummary")
            .and_then(|s| s.get("result"))
            .and_then(|r| r.get(0))
            .cloned()
            .unwrap_or_else(|| json!({}));

        Ok(FetchResult {
            payload: summary,
            provenance,
        })
    }

    /// Ten years of monthly closes, for long-horizon trend context.
    pub async fn monthly_history(
        &self,
        symbol: &str,
    ) -> Result<FetchResult<Vec<f64>>, MarketDataError> {
        let url = format!("{}/v8/finance/chart/{symbol}", self.query1);
        let query = [
            ("range", "10y".to_string()),
            ("interval", "1mo".to_string()),
        ];
        let cache_key = format!("history_{symbol}_10y_1mo");

        let result = self
            .fetcher
            .fetch_json(
                &url,
                &query,
                "yahoo_history",
                &cache_key,
                &FetchPolicy::with_retries(4),
            )
            .await?;
        let (payload, provenance) = result.into_parts();

        Ok(FetchResult {
            payload: chart_closes(first_chart_result(&payload)),
            provenance,
        })
    }
}

// quoteResponse.result rows keyed by their symbol field.
fn index_by_symbol(payload: &Value) -> HashMap<String, Value> {
    let mut by_symbol = HashMap::new();
    if let Some(rows) = payload
        .get("quoteResponse")
        .and_then(|q| q.get("result"))
        .and_then(Value::as_array)
    {
        for row in rows {
            if let Some(symbol) = row.get("symbol").and_then(Value::as_str) {
                by_symbol.insert(symbol.to_string(), row.clone());
            }
        }
    }
    by_symbol
}

fn first_chart_result(payload: &Value) -> Option<&Value> {
    payload.get("chart")?.get("result")?.get(0)
}

// Numeric closes from indicators.quote[0].close, nulls dropped.
fn chart_closes(result: Option<&Value>) -> Vec<f64> {
    result
        .and_then(|r| r.get("indicators"))
        .and_then(|i| i.get("quote"))
        .and_then(|q| q.get(0))
        .and_then(|q| q.get("close"))
        .and_then(Value::as_array)
        .map(|closes| closes.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

/// Price is regularMarketPrice when present, else the last close; the 24h
/// change compares against the second-to-last close when it is non-zero.
fn quote_from_chart(payload: &Value, provenance: Provenance) -> ChartQuote {
    let result = first_chart_result(payload);
    let meta = result.and_then(|r| r.get("meta"));
    let closes = chart_closes(result);

    let price = meta
        .and_then(|m| m.get("regularMarketPrice"))
        .and_then(Value::as_f64)
        .or_else(|| closes.last().copied());

    let change_24h_pct = match price {
        Some(p) if closes.len() >= 2 => {
            let prev = closes[closes.len() - 2];
            (prev != 0.0).then(|| (p / prev - 1.0) * 100.0)
        }
        _ => None,
    };

    let currency = meta
        .and_then(|m| m.get("currency"))
        .and_then(Value::as_str)
        .unwrap_or("USD")
        .to_string();
    let market_time = meta.and_then(|m| m.get("regularMarketTime")).cloned();

    ChartQuote {
        price,
        change_24h_pct,
        currency,
        market_time,
        provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart_payload(market_price: Option<f64>, closes: Value) -> Value {
        let mut meta = json!({"currency": "USD", "regularMarketTime": 1724371200});
        if let Some(price) = market_price {
            meta["regularMarketPrice"] = json!(price);
        }
        json!({
            "chart": {
                "result": [{
                    "meta": meta,
                    "indicators": {"quote": [{"close": closes}]}
                }]
            }
        })
    }

    #[test]
    fn bulk_rows_index_by_symbol_and_skip_unnamed() {
        let payload = json!({
            "quoteResponse": {
                "result": [
                    {"symbol": "SPY", "regularMarketPrice": 512.3},
                    {"regularMarketPrice": 99.0},
                    {"symbol": "QQQ", "regularMarketPrice": 430.1}
                ]
            }
        });
        let by_symbol = index_by_symbol(&payload);
        assert_eq!(by_symbol.len(), 2);
        assert!(by_symbol.contains_key("SPY"));
        assert!(by_symbol.contains_key("QQQ"));
    }

    #[test]
    fn chart_quote_prefers_regular_market_price() {
        let payload = chart_payload(Some(101.5), json!([98.0, 100.0, 99.5]));
        let quote = quote_from_chart(&payload, Provenance::Live);
        assert_eq!(quote.price, Some(101.5));
        // vs the second-to-last close (100.0)
        let pct = quote.change_24h_pct.unwrap();
        assert!((pct - 1.5).abs() < 1e-9, "pct {pct}");
    }

    #[test]
    fn chart_quote_falls_back_to_last_close() {
        let payload = chart_payload(None, json!([98.0, null, 100.0, 102.0]));
        let quote = quote_from_chart(&payload, Provenance::Cache);
        // nulls dropped, so the series is [98.0, 100.0, 102.0]
        assert_eq!(quote.price, Some(102.0));
        let pct = quote.change_24h_pct.unwrap();
        assert!((pct - 2.0).abs() < 1e-9, "pct {pct}");
    }

    #[test]
    fn chart_quote_skips_change_when_prior_close_is_zero() {
        let payload = chart_payload(Some(5.0), json!([0.0, 0.0]));
        let quote = quote_from_chart(&payload, Provenance::Live);
        assert_eq!(quote.price, Some(5.0));
        assert_eq!(quote.change_24h_pct, None);
    }

    #[test]
    fn empty_chart_yields_nulls_not_errors() {
        let quote = quote_from_chart(&json!({"chart": {"result": []}}), Provenance::Live);
        assert_eq!(quote.price, None);
        assert_eq!(quote.change_24h_pct, None);
        assert_eq!(quote.currency, "USD");
        assert_eq!(quote.market_time, None);
    }

    #[test]
    fn closes_survive_missing_indicator_blocks() {
        assert_eq!(chart_closes(None), Vec::<f64>::new());
        let bare = json!({"meta": {}});
        assert_eq!(chart_closes(Some(&bare)), Vec::<f64>::new());
    }
}
