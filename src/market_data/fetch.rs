//! One cached, rate-limited request against one provider.
//!
//! No retries here; failover policy belongs to the manager above.

use log::debug;
use std::sync::Arc;

use crate::market_data::market_data_errors::MarketDataError;
use crate::market_data::market_data_model::{FetchRequest, MarketPayload};
use crate::market_data::providers::market_data_provider::MarketDataProvider;
use crate::market_data::rate_limit::RateLimiter;
use crate::market_data::response_cache::ResponseCache;

pub struct RateLimitedFetcher {
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedFetcher {
    pub fn new(cache: Arc<ResponseCache>, limiter: Arc<RateLimiter>) -> Self {
        Self { cache, limiter }
    }

    /// Cached payload if unexpired; otherwise one provider call, counted
    /// against the provider's rate window. A reached ceiling fails fast
    /// with `RateLimited` before any network attempt.
    pub async fn fetch(
        &self,
        provider: &Arc<dyn MarketDataProvider>,
        request: &FetchRequest,
    ) -> Result<MarketPayload, MarketDataError> {
        let key = request.fingerprint(provider.id());
        let partition = request.kind.cache_partition();

        if let Some(hit) = self.cache.get(partition, &key) {
            debug!("Cache hit for {}", key);
            return Ok(hit);
        }

        if !self.limiter.try_acquire(provider.id()) {
            return Err(MarketDataError::RateLimited {
                provider: provider.id().to_string(),
            });
        }

        let payload = provider.fetch(request).await?;
        self.cache.insert(partition, &key, payload.clone());
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::market_data_model::{DataKind, Quote};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct CountingProvider {
        calls: AtomicU32,
    }

    impl CountingProvider {
        fn new() -> Self {
            Self { calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl MarketDataProvider for CountingProvider {
        fn id(&self) -> &'static str {
            "COUNTING"
        }

        fn supports(&self, kind: DataKind) -> bool {
            kind == DataKind::RealtimeQuotes
        }

        async fn fetch(&self, request: &FetchRequest) -> Result<MarketPayload, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MarketPayload::Quotes(vec![Quote {
                code: request.codes[0].clone(),
                name: "Test".to_string(),
                last: dec!(10.50),
                change: dec!(0.12),
                change_percent: dec!(1.2),
                open: dec!(10.40),
                high: dec!(10.66),
                low: dec!(10.30),
                prev_close: dec!(10.38),
                volume: dec!(1000),
                turnover: dec!(10500),
                timestamp: Utc::now(),
            }]))
        }
    }

    fn fetcher_with_ceiling(ceiling: u32) -> (RateLimitedFetcher, Arc<ResponseCache>) {
        let cache = Arc::new(ResponseCache::new());
        let limiter = Arc::new(
            RateLimiter::new()
                .with_window(Duration::from_secs(3600))
                .with_ceiling("COUNTING", ceiling),
        );
        (RateLimitedFetcher::new(cache.clone(), limiter), cache)
    }

    #[tokio::test]
    async fn test_repeated_request_is_served_from_cache() {
        let (fetcher, _cache) = fetcher_with_ceiling(10);
        let provider = Arc::new(CountingProvider::new());
        let dyn_provider: Arc<dyn MarketDataProvider> = provider.clone();
        let request = FetchRequest::quotes(&["sh600000".to_string()]);

        let first = fetcher.fetch(&dyn_provider, &request).await.unwrap();
        let second = fetcher.fetch(&dyn_provider, &request).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            first.into_quotes().unwrap()[0].code,
            second.into_quotes().unwrap()[0].code
        );
    }

    #[tokio::test]
    async fn test_ceiling_refuses_without_network_attempt() {
        let (fetcher, cache) = fetcher_with_ceiling(3);
        let provider = Arc::new(CountingProvider::new());
        let dyn_provider: Arc<dyn MarketDataProvider> = provider.clone();

        // Distinct codes defeat the cache so every call reaches the limiter.
        for i in 0..3 {
            let request = FetchRequest::quotes(&[format!("sh60000{}", i)]);
            fetcher.fetch(&dyn_provider, &request).await.unwrap();
        }
        let request = FetchRequest::quotes(&["sh600009".to_string()]);
        let err = fetcher.fetch(&dyn_provider, &request).await.unwrap_err();

        assert!(matches!(err, MarketDataError::RateLimited { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.stats().quote_entries, 3);
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_consume_rate_budget() {
        let (fetcher, _cache) = fetcher_with_ceiling(1);
        let provider = Arc::new(CountingProvider::new());
        let dyn_provider: Arc<dyn MarketDataProvider> = provider.clone();
        let request = FetchRequest::quotes(&["sh600000".to_string()]);

        fetcher.fetch(&dyn_provider, &request).await.unwrap();
        // Ceiling is 1; a second identical request still succeeds via cache.
        fetcher.fetch(&dyn_provider, &request).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
