use thiserror::Error;

use crate::fundamentals::FundamentalsError;
use crate::market_data::{MarketDataError, SnapshotError};

// Create a type alias for Result using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the market data core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Fundamentals operation failed: {0}")]
    Fundamentals(#[from] FundamentalsError),

    #[error("Snapshot operation failed: {0}")]
    Snapshot(#[from] SnapshotError),
}
