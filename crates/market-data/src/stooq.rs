use cached_fetch::{FetchPolicy, Provenance, ResilientFetcher};

use crate::error::MarketDataError;

const BASE_URL: &str = "https://stooq.com";

/// Single-row quote from the stooq CSV endpoint, the last resort in the
/// watchlist fallback chain.
#[derive(Debug, Clone)]
pub struct StooqQuote {
    pub price: Option<f64>,
    pub change_24h_pct: Option<f64>,
    pub market_time: Option<String>,
    pub provenance: Provenance,
}

pub struct StooqClient {
    fetcher: ResilientFetcher,
    base_url: String,
}

impl StooqClient {
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

    /// GET /q/l/ for one symbol. `f=sd2t2ohlcv` selects the columns, `h`
    /// asks for a header row, `e=csv` picks the format.
    pub async fn quote(&self, stooq_symbol: &str) -> Result<StooqQuote, MarketDataError> {
        let url = format!(
            "{}/q/l/?s={stooq_symbol}&f=sd2t2ohlcv&h&e=csv",
            self.base_url
        );
        let cache_key = format!("stooq_{stooq_symbol}");

        let result = self
            .fetcher
            .fetch_text(&url, "stooq_quote", &cache_key, &FetchPolicy::with_retries(3))
            .await?;
        let (text, provenance) = result.into_parts();

        parse_quote(&text, stooq_symbol, provenance)
    }
}

fn parse_quote(
    text: &str,
    stooq_symbol: &str,
    provenance: Provenance,
) -> Result<StooqQuote, MarketDataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let record = match reader.records().next() {
        Some(record) => record?,
        None => {
            return Err(MarketDataError::MissingData(format!(
                "no rows returned for {stooq_symbol}"
            )))
        }
    };
    let field = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .and_then(|i| record.get(i))
    };

    let close = parse_float(field("Close"));
    let open = parse_float(field("Open"));
    let change_24h_pct = match (close, open) {
        (Some(close), Some(open)) if open != 0.0 => Some((close / open - 1.0) * 100.0),
        _ => None,
    };

    let date = field("Date").unwrap_or("").trim();
    let time = field("Time").unwrap_or("").trim();
    let market_time = match (date.is_empty(), time.is_empty()) {
        (true, true) => None,
        (false, true) => Some(date.to_string()),
        (true, false) => Some(time.to_string()),
        (false, false) => Some(format!("{date} {time}")),
    };

    Ok(StooqQuote {
        price: close,
        change_24h_pct,
        market_time,
        provenance,
    })
}

// Stooq reports unavailable numbers as "N/D" or "-".
fn parse_float(text: Option<&str>) -> Option<f64> {
    let text = text?.trim();
    if text.is_empty() || text == "N/D" || text == "-" {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Symbol,Date,Time,Open,High,Low,Close,Volume";

    #[test]
    fn parses_a_regular_quote_row() {
        let text = format!("{HEADER}\nSPY.US,2026-08-22,22:00:08,510.0,514.2,509.1,512.55,58231200\n");
        let quote = parse_quote(&text, "spy.us", Provenance::Live).unwrap();
        assert_eq!(quote.price, Some(512.55));
        let pct = quote.change_24h_pct.unwrap();
        assert!((pct - 0.5).abs() < 1e-9, "pct {pct}");
        assert_eq!(quote.market_time.as_deref(), Some("2026-08-22 22:00:08"));
    }

    #[test]
    fn not_available_markers_read_as_null() {
        let text = format!("{HEADER}\nXAUUSD,2026-08-22,22:00:08,N/D,N/D,N/D,N/D,-\n");
        let quote = parse_quote(&text, "xauusd", Provenance::Live).unwrap();
        assert_eq!(quote.price, None);
        assert_eq!(quote.change_24h_pct, None);
    }

    #[test]
    fn missing_time_leaves_just_the_date() {
        let text = format!("{HEADER}\nCL.F,2026-08-22,,75.0,76.1,74.8,75.9,0\n");
        let quote = parse_quote(&text, "cl.f", Provenance::Cache).unwrap();
        assert_eq!(quote.market_time.as_deref(), Some("2026-08-22"));
    }

    #[test]
    fn zero_open_skips_the_change_percent() {
        let text = format!("{HEADER}\nX,2026-08-22,22:00:08,0,1,0,1.5,0\n");
        let quote = parse_quote(&text, "x", Provenance::Live).unwrap();
        assert_eq!(quote.price, Some(1.5));
        assert_eq!(quote.change_24h_pct, None);
    }

    #[test]
    fn header_only_response_is_missing_data() {
        let text = format!("{HEADER}\n");
        let err = parse_quote(&text, "spy.us", Provenance::Live).unwrap_err();
        assert!(err.to_string().contains("spy.us"));
    }
}
