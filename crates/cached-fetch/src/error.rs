use thiserror::Error;

/// Failure surfaced to callers when neither the live fetch nor the cache
/// could produce a payload. Transient failures (429, 5xx, timeouts) are
/// retried internally and never reach this type.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Every attempt failed and no cache entry exists for the key.
    #[error("Fetch failed and no cache available for {cache_key}: {last_error}")]
    Exhausted { cache_key: String, last_error: String },
}
