//! snapshot-loader: Refresh the watchlist quote and crypto news snapshots.
//!
//! Pulls quotes for the built-in watchlist (Yahoo first, Stooq as fallback)
//! and headlines from the crypto RSS feeds, then writes both documents into
//! the data directory. Every request goes through the shared cache-backed
//! fetcher, so a provider outage degrades to the last good payload instead
//! of an empty file.
//!
//! Usage:
//!   cargo run -p snapshot-loader                # quotes + news
//!   cargo run -p snapshot-loader -- --quotes    # watchlist only
//!   cargo run -p snapshot-loader -- --news      # headlines only
//!   cargo run -p snapshot-loader -- --data-dir /tmp/out --cache-dir /tmp/cache

use std::path::Path;

use anyhow::Context;
use cached_fetch::{CacheStore, FetchPolicy, ResilientFetcher, DEFAULT_CACHE_DIR};
use market_data::{StooqClient, YahooClient};
use serde::Serialize;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "snapshot_loader=info,cached_fetch=info,market_data=info,news_feeds=info".into()
            }),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let quotes_flag = args.iter().any(|a| a == "--quotes");
    let news_flag = args.iter().any(|a| a == "--news");

    for arg in &args {
        if arg.starts_with("--")
            && !matches!(
                arg.as_str(),
                "--quotes" | "--news" | "--cache-dir" | "--data-dir"
            )
        {
            eprintln!("Unknown option: {arg}");
            eprintln!();
            eprintln!("Usage:");
            eprintln!("  snapshot-loader                Refresh quotes and news");
            eprintln!("  snapshot-loader --quotes       Watchlist quotes only");
            eprintln!("  snapshot-loader --news         News headlines only");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --cache-dir PATH   Cache directory (default: {DEFAULT_CACHE_DIR}, env MARKETSNAP_CACHE_DIR)");
            eprintln!("  --data-dir PATH    Output directory (default: data, env MARKETSNAP_DATA_DIR)");
            std::process::exit(1);
        }
    }

    let cache_dir = flag_value(&args, "--cache-dir")
        .or_else(|| std::env::var("MARKETSNAP_CACHE_DIR").ok())
        .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string());
    let data_dir = flag_value(&args, "--data-dir")
        .or_else(|| std::env::var("MARKETSNAP_DATA_DIR").ok())
        .unwrap_or_else(|| "data".to_string());

    // No selection flag means refresh everything.
    let do_quotes = quotes_flag || !news_flag;
    let do_news = news_flag || !quotes_flag;

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data directory {data_dir}"))?;

    let fetcher = ResilientFetcher::new(CacheStore::new(&cache_dir));
    tracing::info!(
        "snapshot-loader: cache_dir={}, data_dir={}, quotes={}, news={}",
        cache_dir,
        data_dir,
        do_quotes,
        do_news
    );

    let data_dir = Path::new(&data_dir);

    if do_quotes {
        let yahoo = YahooClient::new(fetcher.clone());
        let stooq = StooqClient::new(fetcher.clone());
        let snapshot = market_data::build_snapshot(&yahoo, &stooq).await;
        tracing::info!("watchlist source: {}", snapshot.source);
        write_pretty_json(&data_dir.join("watchlist_quotes.json"), &snapshot)?;
    }

    if do_news {
        let feeds = news_feeds::default_feeds();
        let snapshot = news_feeds::build_snapshot(&fetcher, &feeds, &FetchPolicy::default()).await;
        tracing::info!("news: kept {} of {} items", snapshot.items.len(), snapshot.count);
        write_pretty_json(&data_dir.join("news_latest.json"), &snapshot)?;
    }

    Ok(())
}

/// Value following a `--flag` argument, if present.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("Saved {}", path.display());
    Ok(())
}
