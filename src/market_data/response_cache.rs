//! Partitioned response cache with kind-specific expiry.
//!
//! An expired record is treated as a miss on read but stays in the map
//! until a cleanup pass physically evicts it; the read path never takes
//! a write lock.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::debug;
use serde::Serialize;

use crate::market_data::market_data_model::{CachePartition, MarketPayload};

/// A cached value with its expiry instant.
#[derive(Debug, Clone)]
pub struct CacheRecord<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheRecord<T> {
    pub fn new(value: T, ttl_secs: i64) -> Self {
        Self {
            value,
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Entry counts per partition, for diagnostics display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCacheStats {
    pub quote_entries: usize,
    pub news_entries: usize,
    pub report_entries: usize,
    pub notice_entries: usize,
}

impl ResponseCacheStats {
    pub fn total(&self) -> usize {
        self.quote_entries + self.news_entries + self.report_entries + self.notice_entries
    }
}

/// Response cache over the four partitions, keyed by request fingerprint.
pub struct ResponseCache {
    quotes: DashMap<String, CacheRecord<MarketPayload>>,
    news: DashMap<String, CacheRecord<MarketPayload>>,
    reports: DashMap<String, CacheRecord<MarketPayload>>,
    notices: DashMap<String, CacheRecord<MarketPayload>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            quotes: DashMap::new(),
            news: DashMap::new(),
            reports: DashMap::new(),
            notices: DashMap::new(),
        }
    }

    fn partition(&self, partition: CachePartition) -> &DashMap<String, CacheRecord<MarketPayload>> {
        match partition {
            CachePartition::Quote => &self.quotes,
            CachePartition::News => &self.news,
            CachePartition::Report => &self.reports,
            CachePartition::Notice => &self.notices,
        }
    }

    /// Unexpired value for `key`, or a miss. Expired records are left in
    /// place for the next cleanup pass.
    pub fn get(&self, partition: CachePartition, key: &str) -> Option<MarketPayload> {
        let map = self.partition(partition);
        let record = map.get(key)?;
        if record.is_expired() {
            return None;
        }
        Some(record.value.clone())
    }

    /// Store `payload` under the partition's TTL.
    pub fn insert(&self, partition: CachePartition, key: &str, payload: MarketPayload) {
        self.partition(partition)
            .insert(key.to_string(), CacheRecord::new(payload, partition.ttl_secs()));
    }

    /// Store with an explicit expiry instant.
    pub fn insert_with_expiry(
        &self,
        partition: CachePartition,
        key: &str,
        payload: MarketPayload,
        expires_at: DateTime<Utc>,
    ) {
        self.partition(partition)
            .insert(key.to_string(), CacheRecord { value: payload, expires_at });
    }

    fn cleanup_partition(&self, partition: CachePartition) -> usize {
        let map = self.partition(partition);
        let before = map.len();
        map.retain(|_, record| !record.is_expired());
        let evicted = before - map.len();
        if evicted > 0 {
            debug!("Evicted {} expired {} cache records", evicted, partition.as_str());
        }
        evicted
    }

    pub fn cleanup_quotes(&self) -> usize {
        self.cleanup_partition(CachePartition::Quote)
    }

    pub fn cleanup_news(&self) -> usize {
        self.cleanup_partition(CachePartition::News)
    }

    pub fn cleanup_reports(&self) -> usize {
        self.cleanup_partition(CachePartition::Report)
    }

    pub fn cleanup_notices(&self) -> usize {
        self.cleanup_partition(CachePartition::Notice)
    }

    /// Sweep every partition; returns the total eviction count.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_quotes() + self.cleanup_news() + self.cleanup_reports() + self.cleanup_notices()
    }

    /// Unconditional full flush of every partition.
    pub fn clear_all(&self) {
        self.quotes.clear();
        self.news.clear();
        self.reports.clear();
        self.notices.clear();
    }

    pub fn stats(&self) -> ResponseCacheStats {
        ResponseCacheStats {
            quote_entries: self.quotes.len(),
            news_entries: self.news.len(),
            report_entries: self.reports.len(),
            notice_entries: self.notices.len(),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::market_data_model::{NewsItem, Quote};
    use rust_decimal_macros::dec;

    fn quote_payload(code: &str) -> MarketPayload {
        MarketPayload::Quotes(vec![Quote {
            code: code.to_string(),
            name: "Test".to_string(),
            last: dec!(10.50),
            change: dec!(0.12),
            change_percent: dec!(1.2),
            open: dec!(10.40),
            high: dec!(10.60),
            low: dec!(10.30),
            prev_close: dec!(10.38),
            volume: dec!(1000000),
            turnover: dec!(10500000),
            timestamp: Utc::now(),
        }])
    }

    fn news_payload() -> MarketPayload {
        MarketPayload::News(vec![NewsItem {
            title: "headline".to_string(),
            source: "wire".to_string(),
            url: None,
            published_at: Utc::now(),
        }])
    }

    #[test]
    fn test_get_before_expiry_returns_stored_value() {
        let cache = ResponseCache::new();
        cache.insert(CachePartition::Quote, "k", quote_payload("sh600000"));

        let hit = cache.get(CachePartition::Quote, "k").unwrap();
        assert_eq!(hit.into_quotes().unwrap()[0].code, "sh600000");
    }

    #[test]
    fn test_expired_record_is_a_miss_but_stays_until_cleanup() {
        let cache = ResponseCache::new();
        cache.insert_with_expiry(
            CachePartition::Quote,
            "k",
            quote_payload("sh600000"),
            Utc::now() - Duration::seconds(1),
        );

        assert!(cache.get(CachePartition::Quote, "k").is_none());
        assert_eq!(cache.stats().quote_entries, 1);

        assert_eq!(cache.cleanup_quotes(), 1);
        assert_eq!(cache.stats().quote_entries, 0);
    }

    #[test]
    fn test_partitions_are_independent() {
        let cache = ResponseCache::new();
        cache.insert(CachePartition::Quote, "k", quote_payload("sh600000"));
        cache.insert(CachePartition::News, "k", news_payload());

        assert!(cache.get(CachePartition::Report, "k").is_none());
        assert_eq!(cache.stats().total(), 2);
    }

    #[test]
    fn test_cleanup_only_evicts_expired() {
        let cache = ResponseCache::new();
        cache.insert(CachePartition::News, "fresh", news_payload());
        cache.insert_with_expiry(
            CachePartition::News,
            "stale",
            news_payload(),
            Utc::now() - Duration::seconds(1),
        );

        assert_eq!(cache.cleanup_news(), 1);
        assert!(cache.get(CachePartition::News, "fresh").is_some());
    }

    #[test]
    fn test_clear_all_flushes_every_partition() {
        let cache = ResponseCache::new();
        cache.insert(CachePartition::Quote, "a", quote_payload("sh600000"));
        cache.insert(CachePartition::News, "b", news_payload());
        cache.insert(CachePartition::Report, "c", news_payload());
        cache.insert(CachePartition::Notice, "d", news_payload());

        cache.clear_all();
        assert_eq!(cache.stats().total(), 0);
    }
}
