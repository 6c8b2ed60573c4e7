/// Data source identifiers
pub const PROVIDER_SINA: &str = "SINA";
pub const PROVIDER_TENCENT: &str = "TENCENT";
pub const PROVIDER_EASTMONEY: &str = "EASTMONEY";

/// Response cache TTLs per partition
pub const QUOTE_CACHE_TTL_SECS: i64 = 120;
pub const NEWS_CACHE_TTL_SECS: i64 = 2 * 3600;
pub const REPORT_CACHE_TTL_SECS: i64 = 12 * 3600;
pub const NOTICE_CACHE_TTL_SECS: i64 = 12 * 3600;

/// Rate limiting defaults (per provider, per rolling window)
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
pub const DEFAULT_RATE_CEILING: u32 = 120;

/// A provider failing this many times in a row is moved to the back of
/// the candidate order until it succeeds again.
pub const DEMOTION_FAILURE_THRESHOLD: u32 = 3;

/// Cap on concurrent outbound resolves during first-load warm-up.
pub const FIRST_LOAD_CONCURRENCY_LIMIT: usize = 4;

/// Per-request transport timeout
pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Codes per outbound request when prefetching instrument quotes.
pub const QUOTE_PREFETCH_BATCH: usize = 20;
