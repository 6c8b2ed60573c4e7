//! Fundamentals cache, separate from the quote-path caches.
//!
//! Financial statements change far less often than quotes, so records
//! live for hours and are keyed by instrument code alone.

use dashmap::DashMap;

use crate::fundamentals::models::FundamentalsRecord;
use crate::market_data::response_cache::CacheRecord;

/// Statements are republished quarterly; hours of staleness is fine.
const FUNDAMENTALS_CACHE_TTL_SECS: i64 = 6 * 3600;

pub struct FundamentalsCache {
    records: DashMap<String, CacheRecord<FundamentalsRecord>>,
    ttl_secs: i64,
}

impl FundamentalsCache {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            ttl_secs: FUNDAMENTALS_CACHE_TTL_SECS,
        }
    }

    #[cfg(test)]
    fn with_ttl_secs(ttl_secs: i64) -> Self {
        Self {
            records: DashMap::new(),
            ttl_secs,
        }
    }

    /// Unexpired record for `code`; an expired record is a miss and stays
    /// until `clear_expired` sweeps it.
    pub fn get(&self, code: &str) -> Option<FundamentalsRecord> {
        let record = self.records.get(code)?;
        if record.is_expired() {
            return None;
        }
        Some(record.value.clone())
    }

    pub fn insert(&self, record: FundamentalsRecord) {
        self.records.insert(
            record.code.clone(),
            CacheRecord::new(record, self.ttl_secs),
        );
    }

    /// Unconditional flush.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Evict expired records; returns the eviction count.
    pub fn clear_expired(&self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired());
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for FundamentalsCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fundamentals::models::FundamentalsSource;

    #[test]
    fn test_get_before_expiry() {
        let cache = FundamentalsCache::new();
        cache.insert(FundamentalsRecord::empty("sh600000", FundamentalsSource::Akshare));

        let hit = cache.get("sh600000").unwrap();
        assert_eq!(hit.code, "sh600000");
        assert_eq!(hit.source, FundamentalsSource::Akshare);
    }

    #[test]
    fn test_expired_record_is_miss_until_swept() {
        let cache = FundamentalsCache::with_ttl_secs(-1);
        cache.insert(FundamentalsRecord::empty("sh600000", FundamentalsSource::Tushare));

        assert!(cache.get("sh600000").is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.clear_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_flushes_everything() {
        let cache = FundamentalsCache::new();
        cache.insert(FundamentalsRecord::empty("sh600000", FundamentalsSource::Akshare));
        cache.insert(FundamentalsRecord::empty("sz000001", FundamentalsSource::Akshare));

        cache.clear();
        assert!(cache.is_empty());
    }
}
