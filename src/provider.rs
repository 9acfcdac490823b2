//! Price-data boundary.
//!
//! Data acquisition and caching live outside this crate. The orchestrator
//! only needs a fallible fetch per ticker; a failed or short fetch turns
//! into a manifest entry for that strategy, never a process-level failure.

use thiserror::Error;

use crate::domain::PriceBar;

/// Structured errors from data providers.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("data error: {0}")]
    Other(String),
}

/// Fetches daily bars for a ticker.
///
/// Returned series must be sorted by date (the sampler's caller invariant).
pub trait PriceDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn fetch(&self, ticker: &str) -> Result<Vec<PriceBar>, DataError>;
}
