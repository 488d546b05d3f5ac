use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

/// Classified result of one fetch attempt. The retry loop dispatches over
/// this enum instead of branching on reqwest's error hierarchy, which
/// keeps the policy testable without a live transport.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// 2xx response body, not yet decoded.
    Success(String),
    /// HTTP 429, with the `Retry-After` value when present and numeric.
    RateLimited { retry_after_secs: Option<u64> },
    /// HTTP 5xx, worth retrying without consulting headers.
    ServerError(StatusCode),
    /// Any other non-2xx status.
    ClientError(StatusCode),
    /// Connection failure, timeout, or an unreadable body.
    TransportError(String),
}

/// Classify a non-2xx response by status and headers.
pub(crate) fn classify_failure(status: StatusCode, headers: &HeaderMap) -> AttemptOutcome {
    if status == StatusCode::TOO_MANY_REQUESTS {
        AttemptOutcome::RateLimited {
            retry_after_secs: retry_after_secs(headers),
        }
    } else if status.is_server_error() {
        AttemptOutcome::ServerError(status)
    } else {
        AttemptOutcome::ClientError(status)
    }
}

// Retry-After is honored only as a plain integer number of seconds;
// HTTP-date values fall through to the backoff formula.
fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()
        .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|v| v.parse().ok())
}
