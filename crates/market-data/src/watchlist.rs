use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stooq::StooqClient;
use crate::yahoo::YahooClient;

/// Fixed set of assets the quote snapshot tracks.
pub const WATCHLIST: &[WatchlistEntry] = &[
    WatchlistEntry {
        id: "spy",
        symbol: "SPY",
        name: "S&P 500 ETF",
        stooq: "spy.us",
    },
    WatchlistEntry {
        id: "qqq",
        symbol: "QQQ",
        name: "Nasdaq 100 ETF",
        stooq: "qqq.us",
    },
    WatchlistEntry {
        id: "nvda",
        symbol: "NVDA",
        name: "NVIDIA",
        stooq: "nvda.us",
    },
    WatchlistEntry {
        id: "gold",
        symbol: "GC=F",
        name: "Gold Futures",
        stooq: "xauusd",
    },
    WatchlistEntry {
        id: "oil",
        symbol: "CL=F",
        name: "Crude Oil Futures",
        stooq: "cl.f",
    },
];

#[derive(Debug, Clone, Copy)]
pub struct WatchlistEntry {
    pub id: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
    /// Symbol on stooq.com, which spells futures differently.
    pub stooq: &'static str,
}

/// One snapshot row. Price fields stay null when every provider missed;
/// `fetch_source` tells consumers which provider and freshness served it
/// (e.g. `yahoo_quote_live`, `stooq_cache`, or `unavailable`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRow {
    pub asset: String,
    pub symbol: String,
    pub name: String,
    pub price: Option<f64>,
    pub change_24h_pct: Option<f64>,
    pub currency: String,
    pub market_time: Option<Value>,
    pub fetch_source: String,
}

impl QuoteRow {
    fn unavailable(entry: &WatchlistEntry) -> Self {
        Self {
            asset: entry.id.to_string(),
            symbol: entry.symbol.to_string(),
            name: entry.name.to_string(),
            price: None,
            change_24h_pct: None,
            currency: "USD".to_string(),
            market_time: None,
            fetch_source: "unavailable".to_string(),
        }
    }
}

/// Watchlist quote document written to the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub generated_at: String,
    /// Rollup of the per-row sources: `unavailable`, a single source
    /// string when one provider served everything, or `mixed`.
    pub source: String,
    pub quotes: BTreeMap<String, QuoteRow>,
}

/// Assemble the watchlist snapshot: one bulk Yahoo call, then per-symbol
/// fallback to the Yahoo chart endpoint and stooq. Never fails as a
/// whole; rows the whole chain missed stay `unavailable`.
pub async fn build_snapshot(yahoo: &YahooClient, stooq: &StooqClient) -> QuoteSnapshot {
    let mut quotes: BTreeMap<String, QuoteRow> = WATCHLIST
        .iter()
        .map(|entry| (entry.id.to_string(), QuoteRow::unavailable(entry)))
        .collect();

    let symbols: Vec<&str> = WATCHLIST.iter().map(|entry| entry.symbol).collect();
    let (by_symbol, bulk_source) = match yahoo.bulk_quotes(&symbols).await {
        Ok(result) => {
            let source = format!("yahoo_quote_{}", result.provenance);
            (result.payload, Some(source))
        }
        Err(err) => {
            tracing::warn!("watchlist bulk quote fallback: {}", err);
            (HashMap::new(), None)
        }
    };

    for entry in WATCHLIST {
        if let Some(row) = by_symbol.get(entry.symbol) {
            if let Some(quote) = quote_from_bulk_row(entry, row, bulk_source.as_deref()) {
                quotes.insert(entry.id.to_string(), quote);
                continue;
            }
        }

        match yahoo.chart_quote(entry.symbol).await {
            Ok(chart) if chart.price.is_some() => {
                quotes.insert(
                    entry.id.to_string(),
                    QuoteRow {
                        asset: entry.id.to_string(),
                        symbol: entry.symbol.to_string(),
                        name: entry.name.to_string(),
                        price: chart.price,
                        change_24h_pct: chart.change_24h_pct,
                        currency: chart.currency,
                        market_time: chart.market_time,
                        fetch_source: format!("yahoo_chart_{}", chart.provenance),
                    },
                );
                continue;
            }
            Ok(_) => {}
            Err(err) => tracing::debug!("{} chart quote fallback: {}", entry.symbol, err),
        }

        match stooq.quote(entry.stooq).await {
            Ok(quote) if quote.price.is_some() => {
                quotes.insert(
                    entry.id.to_string(),
                    QuoteRow {
                        asset: entry.id.to_string(),
                        symbol: entry.symbol.to_string(),
                        name: entry.name.to_string(),
                        price: quote.price,
                        change_24h_pct: quote.change_24h_pct,
                        currency: "USD".to_string(),
                        market_time: quote.market_time.map(Value::from),
                        fetch_source: format!("stooq_{}", quote.provenance),
                    },
                );
            }
            Ok(_) => {}
            Err(err) => tracing::debug!("{} stooq quote fallback: {}", entry.stooq, err),
        }
    }

    QuoteSnapshot {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        source: rollup_source(&quotes),
        quotes,
    }
}

// A bulk row only counts when it carries a numeric price.
fn quote_from_bulk_row(
    entry: &WatchlistEntry,
    row: &Value,
    bulk_source: Option<&str>,
) -> Option<QuoteRow> {
    let price = row.get("regularMarketPrice").and_then(Value::as_f64)?;
    Some(QuoteRow {
        asset: entry.id.to_string(),
        symbol: entry.symbol.to_string(),
        name: entry.name.to_string(),
        price: Some(price),
        change_24h_pct: row
            .get("regularMarketChangePercent")
            .and_then(Value::as_f64),
        currency: row
            .get("currency")
            .and_then(Value::as_str)
            .unwrap_or("USD")
            .to_string(),
        market_time: row.get("regularMarketTime").cloned(),
        fetch_source: bulk_source.unwrap_or("yahoo_quote_unknown").to_string(),
    })
}

/// Distinct sources across priced rows: none means `unavailable`, one is
/// reported as-is, several collapse to `mixed`.
fn rollup_source(quotes: &BTreeMap<String, QuoteRow>) -> String {
    let mut sources: BTreeSet<String> = quotes
        .values()
        .filter(|row| row.price.is_some() && !row.fetch_source.is_empty())
        .map(|row| row.fetch_source.clone())
        .collect();

    match sources.len() {
        0 => "unavailable".to_string(),
        1 => sources.pop_first().unwrap_or_default(),
        _ => "mixed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: &str, price: Option<f64>, fetch_source: &str) -> (String, QuoteRow) {
        (
            id.to_string(),
            QuoteRow {
                asset: id.to_string(),
                symbol: id.to_uppercase(),
                name: id.to_string(),
                price,
                change_24h_pct: None,
                currency: "USD".to_string(),
                market_time: None,
                fetch_source: fetch_source.to_string(),
            },
        )
    }

    #[test]
    fn rollup_is_unavailable_without_priced_rows() {
        let quotes = BTreeMap::from([row("spy", None, "unavailable")]);
        assert_eq!(rollup_source(&quotes), "unavailable");
    }

    #[test]
    fn rollup_reports_a_single_source_verbatim() {
        let quotes = BTreeMap::from([
            row("spy", Some(1.0), "yahoo_quote_cache"),
            row("qqq", Some(2.0), "yahoo_quote_cache"),
        ]);
        assert_eq!(rollup_source(&quotes), "yahoo_quote_cache");
    }

    #[test]
    fn rollup_collapses_multiple_sources_to_mixed() {
        let quotes = BTreeMap::from([
            row("spy", Some(1.0), "yahoo_quote_live"),
            row("gold", Some(2.0), "stooq_live"),
        ]);
        assert_eq!(rollup_source(&quotes), "mixed");
    }

    #[test]
    fn unpriced_rows_do_not_count_toward_the_rollup() {
        let quotes = BTreeMap::from([
            row("spy", Some(1.0), "yahoo_quote_live"),
            row("oil", None, "unavailable"),
        ]);
        assert_eq!(rollup_source(&quotes), "yahoo_quote_live");
    }

    #[test]
    fn bulk_row_with_price_fills_all_fields() {
        let entry = &WATCHLIST[0];
        let bulk = json!({
            "symbol": "SPY",
            "regularMarketPrice": 512.3,
            "regularMarketChangePercent": -0.42,
            "currency": "USD",
            "regularMarketTime": 1724371200
        });
        let quote = quote_from_bulk_row(entry, &bulk, Some("yahoo_quote_live")).unwrap();
        assert_eq!(quote.price, Some(512.3));
        assert_eq!(quote.change_24h_pct, Some(-0.42));
        assert_eq!(quote.market_time, Some(json!(1724371200)));
        assert_eq!(quote.fetch_source, "yahoo_quote_live");
    }

    #[test]
    fn bulk_rows_without_numeric_price_are_rejected() {
        let entry = &WATCHLIST[0];
        let no_price = json!({"symbol": "SPY"});
        assert!(quote_from_bulk_row(entry, &no_price, Some("yahoo_quote_live")).is_none());
        let text_price = json!({"symbol": "SPY", "regularMarketPrice": "high"});
        assert!(quote_from_bulk_row(entry, &text_price, Some("yahoo_quote_live")).is_none());
    }
}
