use cached_fetch::FetchError;
use thiserror::Error;

/// Provider-level failures. Snapshot assembly degrades per asset instead
/// of aborting, so these mostly end up as log lines.
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Provider request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("CSV parse failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing data: {0}")]
    MissingData(String),
}
