pub(crate) mod failover;
pub(crate) mod fetch;
pub(crate) mod market_data_constants;
pub(crate) mod market_data_errors;
pub(crate) mod market_data_model;
pub(crate) mod market_data_service;
pub(crate) mod providers;
pub(crate) mod rate_limit;
pub(crate) mod response_cache;
pub(crate) mod snapshot_store;

// Re-export the public interface
pub use market_data_constants::*;
pub use market_data_model::{
    normalize_stock_code, CachePartition, DataKind, FetchRequest, GlobalIndex, HotTopic,
    IndustryRank, LongShortEntry, MarketIndex, MarketPayload, MarketSentiment, MoneyFlowEntry,
    NewsItem, PositionSide, ProviderStatus, Quote, SentimentLabel, SnapshotEntry,
};
pub use market_data_service::{MarketDataService, MarketDiagnostics, SnapshotAge};
pub use failover::FailoverManager;
pub use fetch::RateLimitedFetcher;
pub use rate_limit::{RateLimiter, RateWindowStats};
pub use response_cache::{CacheRecord, ResponseCache, ResponseCacheStats};
pub use snapshot_store::SnapshotStore;

// Re-export provider types
pub use providers::market_data_provider::MarketDataProvider;
pub use providers::{EastmoneyProvider, SinaProvider, TencentProvider};

// Re-export error types for convenience
pub use market_data_errors::{MarketDataError, ProviderFailure, SnapshotError};
