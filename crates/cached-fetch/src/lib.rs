pub mod cache;
pub mod error;
pub mod fetcher;
pub mod outcome;
pub mod policy;


pub use cache::{CacheStore, DEFAULT_CACHE_DIR};
pub use error::FetchError;
pub use fetcher::{FetchResult, Provenance, ResilientFetcher};
pub use policy::FetchPolicy;
