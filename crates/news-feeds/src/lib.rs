//! Crypto news headlines pulled from public RSS feeds, fetched with the
//! same cache-backed retry behaviour as the market data providers.

pub mod rss;


use cached_fetch::{FetchError, FetchPolicy, ResilientFetcher};
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub use rss::NewsItem;

/// Most items kept in one snapshot, across all feeds.
const MAX_ITEMS: usize = 40;

/// A named RSS feed.
#[derive(Debug, Clone)]
pub struct FeedSpec {
    pub name: String,
    pub url: String,
}

impl FeedSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// The feeds a snapshot covers by default.
pub fn default_feeds() -> Vec<FeedSpec> {
    vec![
        FeedSpec::new(
            "CoinDesk",
            "https://www.coindesk.com/arc/outboundfeeds/rss/",
        ),
        FeedSpec::new("Cointelegraph", "https://cointelegraph.com/rss"),
    ]
}

/// Snapshot document written to the data directory. `count` is the total
/// number of items collected, taken before the cap is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSnapshot {
    pub generated_at: String,
    pub count: usize,
    pub items: Vec<NewsItem>,
}

/// Fetch and parse one feed. Every item is tagged with the feed name and
/// with whether the XML came over the network or out of the cache.
pub async fn fetch_feed(
    fetcher: &ResilientFetcher,
    feed: &FeedSpec,
    policy: &FetchPolicy,
) -> Result<Vec<NewsItem>, FetchError> {
    let result = fetcher
        .fetch_text(&feed.url, "news_feed", &feed.url, policy)
        .await?;
    let (xml, provenance) = result.into_parts();

    let mut items = rss::parse_items(&xml, &feed.name);
    for item in &mut items {
        item.fetch_source = provenance.as_str().to_string();
    }
    Ok(items)
}

/// Pull every feed and assemble the capped snapshot. A feed that fails even
/// after the cache fallback is logged and skipped, so one dead feed cannot
/// take the whole snapshot down.
pub async fn build_snapshot(
    fetcher: &ResilientFetcher,
    feeds: &[FeedSpec],
    policy: &FetchPolicy,
) -> NewsSnapshot {
    let mut all_items = Vec::new();
    for feed in feeds {
        match fetch_feed(fetcher, feed, policy).await {
            Ok(items) => {
                tracing::info!("{}: {} headlines", feed.name, items.len());
                all_items.extend(items);
            }
            Err(err) => {
                tracing::warn!("news feed error for {}: {}", feed.name, err);
            }
        }
    }

    let count = all_items.len();
    all_items.truncate(MAX_ITEMS);

    NewsSnapshot {
        generated_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
        count,
        items: all_items,
    }
}
