use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::CacheStore;
use crate::error::FetchError;
use crate::outcome::{classify_failure, AttemptOutcome};
use crate::policy::{backoff_delay, FetchPolicy};

// Yahoo endpoints reject the default reqwest agent.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Whether a payload came from the live network call or the disk cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Live,
    Cache,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Live => "live",
            Provenance::Cache => "cache",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload plus its freshness tag, so downstream reporting can disclose
/// whether it is showing live or last-known-good data.
#[derive(Debug, Clone)]
pub struct FetchResult<T> {
    pub payload: T,
    pub provenance: Provenance,
}

impl<T> FetchResult<T> {
    pub fn into_parts(self) -> (T, Provenance) {
        (self.payload, self.provenance)
    }
}

/// HTTP GET with bounded retries, rate-limit-aware backoff, and fallback
/// to the last cached payload when the live path is exhausted.
///
/// Three terminal outcomes per call: live success (cache refreshed),
/// cache fallback, or [`FetchError::Exhausted`]. `Provenance::Live`
/// guarantees the cache entry was just rewritten with the same payload.
#[derive(Clone)]
pub struct ResilientFetcher {
    client: Client,
    cache: CacheStore,
}

impl ResilientFetcher {
    pub fn new(cache: CacheStore) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, cache }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// GET a JSON document. `query` pairs are appended to the URL.
    pub async fn fetch_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        namespace: &str,
        cache_key: &str,
        policy: &FetchPolicy,
    ) -> Result<FetchResult<Value>, FetchError> {
        self.run(
            url,
            query,
            namespace,
            cache_key,
            policy,
            |store, body| {
                let payload: Value =
                    serde_json::from_str(body).map_err(|e| format!("invalid JSON body: {e}"))?;
                store
                    .put_json(namespace, cache_key, &payload)
                    .map_err(|e| format!("cache write failed: {e}"))?;
                Ok(payload)
            },
            |store| store.get_json(namespace, cache_key),
        )
        .await
    }

    /// GET a raw text document (CSV, RSS feeds and the like).
    pub async fn fetch_text(
        &self,
        url: &str,
        namespace: &str,
        cache_key: &str,
        policy: &FetchPolicy,
    ) -> Result<FetchResult<String>, FetchError> {
        self.run(
            url,
            &[],
            namespace,
            cache_key,
            policy,
            |store, body| {
                store
                    .put_text(namespace, cache_key, body)
                    .map_err(|e| format!("cache write failed: {e}"))?;
                Ok(body.to_string())
            },
            |store| store.get_text(namespace, cache_key),
        )
        .await
    }

    /// Shared retry loop. `accept` decodes and caches a 2xx body (a
    /// rejected body counts as a failed attempt, so `Live` always implies
    /// a fresh cache entry); `recover` reads the cache once the live path
    /// is exhausted.
    async fn run<T>(
        &self,
        url: &str,
        query: &[(&str, String)],
        namespace: &str,
        cache_key: &str,
        policy: &FetchPolicy,
        accept: impl Fn(&CacheStore, &str) -> Result<T, String>,
        recover: impl FnOnce(&CacheStore) -> Option<T>,
    ) -> Result<FetchResult<T>, FetchError> {
        let mut last_error: Option<String> = None;

        for attempt in 0..policy.max_retries {
            match self.attempt(url, query, policy.timeout).await {
                AttemptOutcome::Success(body) => match accept(&self.cache, &body) {
                    Ok(payload) => {
                        tracing::debug!(
                            "{} fetched live for {} (attempt {}/{})",
                            namespace,
                            cache_key,
                            attempt + 1,
                            policy.max_retries
                        );
                        return Ok(FetchResult {
                            payload,
                            provenance: Provenance::Live,
                        });
                    }
                    Err(err) => {
                        tracing::warn!(
                            "{} attempt {}/{} rejected a 2xx body: {}",
                            namespace,
                            attempt + 1,
                            policy.max_retries,
                            err
                        );
                        last_error = Some(err);
                        if attempt + 1 < policy.max_retries {
                            tokio::time::sleep(backoff_delay(attempt, policy.min_wait)).await;
                        }
                    }
                },
                AttemptOutcome::RateLimited { retry_after_secs } => {
                    // Server-provided delay wins over the formula, floored
                    // at min_wait either way.
                    let wait = match retry_after_secs {
                        Some(secs) => policy.min_wait.max(Duration::from_secs(secs)),
                        None => backoff_delay(attempt, policy.min_wait),
                    };
                    tracing::warn!(
                        "{} 429 rate limited, waiting {:.1}s before retry {}/{}",
                        namespace,
                        wait.as_secs_f64(),
                        attempt + 1,
                        policy.max_retries
                    );
                    last_error = Some("rate limited (HTTP 429)".to_string());
                    tokio::time::sleep(wait).await;
                }
                AttemptOutcome::ServerError(status) => {
                    let wait = backoff_delay(attempt, policy.min_wait);
                    tracing::warn!(
                        "{} HTTP {} for {}, waiting {:.1}s before retry {}/{}",
                        namespace,
                        status.as_u16(),
                        cache_key,
                        wait.as_secs_f64(),
                        attempt + 1,
                        policy.max_retries
                    );
                    last_error = Some(format!("server error (HTTP {})", status.as_u16()));
                    tokio::time::sleep(wait).await;
                }
                AttemptOutcome::ClientError(status) => {
                    tracing::warn!(
                        "{} attempt {}/{} failed: HTTP {}",
                        namespace,
                        attempt + 1,
                        policy.max_retries,
                        status.as_u16()
                    );
                    last_error = Some(format!("client error (HTTP {status})"));
                    if attempt + 1 < policy.max_retries {
                        tokio::time::sleep(backoff_delay(attempt, policy.min_wait)).await;
                    }
                }
                AttemptOutcome::TransportError(err) => {
                    tracing::warn!(
                        "{} attempt {}/{} failed: {}",
                        namespace,
                        attempt + 1,
                        policy.max_retries,
                        err
                    );
                    last_error = Some(err);
                    if attempt + 1 < policy.max_retries {
                        tokio::time::sleep(backoff_delay(attempt, policy.min_wait)).await;
                    }
                }
            }
        }

        if let Some(payload) = recover(&self.cache) {
            tracing::warn!(
                "{} live fetch exhausted, serving cached payload for {}",
                namespace,
                cache_key
            );
            return Ok(FetchResult {
                payload,
                provenance: Provenance::Cache,
            });
        }

        Err(FetchError::Exhausted {
            cache_key: cache_key.to_string(),
            last_error: last_error.unwrap_or_else(|| "no attempts made".to_string()),
        })
    }

    /// One GET attempt, classified. Every failure mode maps onto the
    /// outcome enum; nothing escapes as a panic or early return.
    async fn attempt(&self, url: &str, query: &[(&str, String)], timeout: Duration) -> AttemptOutcome {
        let request = self.client.get(url).query(query).timeout(timeout);
        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.text().await {
                        Ok(body) => AttemptOutcome::Success(body),
                        Err(err) => {
                            AttemptOutcome::TransportError(format!("failed to read body: {err}"))
                        }
                    }
                } else {
                    classify_failure(status, response.headers())
                }
            }
            Err(err) => AttemptOutcome::TransportError(err.to_string()),
        }
    }
}
