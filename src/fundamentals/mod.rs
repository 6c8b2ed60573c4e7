//! Fundamentals Module
//!
//! Company financial-statement data resolved from one of two providers:
//! Tushare Pro (token-gated, preferred when configured) and AKShare via
//! an AKTools REST bridge (free fallback). Parallel to the quote path,
//! with its own cache and failover.

pub mod akshare_client;
pub mod cache;
pub mod errors;
pub mod models;
pub mod service;
pub mod tushare_client;

pub use akshare_client::AkshareClient;
pub use cache::FundamentalsCache;
pub use errors::FundamentalsError;
pub use models::{FundamentalsRecord, FundamentalsSource};
pub use service::{fundamentals_order, FundamentalsService};
pub use tushare_client::TushareClient;
