pub mod coingecko;
pub mod error;
pub mod stooq;
pub mod watchlist;
pub mod yahoo;


pub use coingecko::{CoinGeckoClient, MarketChart};
pub use error::MarketDataError;
pub use stooq::{StooqClient, StooqQuote};
pub use watchlist::{build_snapshot, QuoteRow, QuoteSnapshot, WatchlistEntry, WATCHLIST};
pub use yahoo::{ChartQuote, YahooClient};
