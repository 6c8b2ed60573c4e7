//! Fundamentals facade: two-provider failover with its own cache.

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::fundamentals::akshare_client::AkshareClient;
use crate::fundamentals::cache::FundamentalsCache;
use crate::fundamentals::errors::FundamentalsError;
use crate::fundamentals::models::{FundamentalsRecord, FundamentalsSource};
use crate::fundamentals::tushare_client::TushareClient;
use crate::market_data::market_data_errors::ProviderFailure;
use crate::market_data::market_data_model::normalize_stock_code;
use crate::settings::{DataSourcePriority, MarketSettings};

/// Provider order as a pure function of the configuration: the
/// token-gated provider leads only when it is both preferred and
/// usable; without a token it is not a candidate at all.
pub fn fundamentals_order(prefer_tushare: bool, has_token: bool) -> Vec<FundamentalsSource> {
    match (prefer_tushare, has_token) {
        (true, true) => vec![FundamentalsSource::Tushare, FundamentalsSource::Akshare],
        (false, true) => vec![FundamentalsSource::Akshare, FundamentalsSource::Tushare],
        (_, false) => vec![FundamentalsSource::Akshare],
    }
}

pub struct FundamentalsService {
    tushare: TushareClient,
    akshare: AkshareClient,
    cache: FundamentalsCache,
    prefer_tushare: AtomicBool,
    token: RwLock<String>,
}

impl FundamentalsService {
    pub fn new(settings: &MarketSettings) -> Self {
        let proxy = settings.proxy.as_ref();
        Self {
            tushare: TushareClient::new(proxy),
            akshare: AkshareClient::new(proxy),
            cache: FundamentalsCache::new(),
            prefer_tushare: AtomicBool::new(
                settings.data_source_priority == DataSourcePriority::Tushare,
            ),
            token: RwLock::new(settings.tushare_token.clone()),
        }
    }

    /// Takes effect on the next resolution.
    pub fn set_prefer_tushare(&self, prefer: bool) {
        self.prefer_tushare.store(prefer, Ordering::SeqCst);
    }

    /// Takes effect on the next resolution.
    pub fn set_tushare_token(&self, token: impl Into<String>) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = token.into();
    }

    fn current_token(&self) -> String {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Cached or freshly resolved fundamentals for one instrument.
    pub async fn get_fundamentals(
        &self,
        code: &str,
    ) -> Result<FundamentalsRecord, FundamentalsError> {
        let normalized = normalize_stock_code(code);

        if let Some(hit) = self.cache.get(&normalized) {
            debug!("Fundamentals cache hit for {}", normalized);
            return Ok(hit);
        }

        let token = self.current_token();
        let order = fundamentals_order(
            self.prefer_tushare.load(Ordering::SeqCst),
            !token.is_empty(),
        );

        let mut failures: Vec<ProviderFailure> = Vec::new();
        for source in order {
            let result = match source {
                FundamentalsSource::Tushare => {
                    self.tushare.get_fundamentals(&token, &normalized).await
                }
                FundamentalsSource::Akshare => self.akshare.get_fundamentals(&normalized).await,
            };
            match result {
                Ok(record) => {
                    self.cache.insert(record.clone());
                    return Ok(record);
                }
                Err(e) => {
                    warn!(
                        "Fundamentals provider '{}' failed for {}: {}. Trying next.",
                        source, normalized, e
                    );
                    failures.push(ProviderFailure {
                        provider: source.as_str().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Err(FundamentalsError::AllProvidersFailed(failures))
    }

    /// Unconditional cache flush.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Evict expired records; returns the eviction count.
    pub fn clear_expired_cache(&self) -> usize {
        self.cache.clear_expired()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_prefers_tushare_only_with_token() {
        assert_eq!(
            fundamentals_order(true, true),
            vec![FundamentalsSource::Tushare, FundamentalsSource::Akshare]
        );
        assert_eq!(
            fundamentals_order(false, true),
            vec![FundamentalsSource::Akshare, FundamentalsSource::Tushare]
        );
        assert_eq!(fundamentals_order(true, false), vec![FundamentalsSource::Akshare]);
        assert_eq!(fundamentals_order(false, false), vec![FundamentalsSource::Akshare]);
    }

    #[test]
    fn test_setters_apply_immediately() {
        let service = FundamentalsService::new(&MarketSettings::default());
        assert!(!service.prefer_tushare.load(Ordering::SeqCst));
        assert!(service.current_token().is_empty());

        service.set_prefer_tushare(true);
        service.set_tushare_token("tok-123");

        assert!(service.prefer_tushare.load(Ordering::SeqCst));
        assert_eq!(service.current_token(), "tok-123");
    }

    #[tokio::test]
    async fn test_cached_record_short_circuits_providers() {
        let service = FundamentalsService::new(&MarketSettings::default());
        service
            .cache
            .insert(FundamentalsRecord::empty("sh600000", FundamentalsSource::Akshare));

        let record = service.get_fundamentals("600000").await.unwrap();
        assert_eq!(record.code, "sh600000");
        assert_eq!(service.cached_count(), 1);
    }

    #[test]
    fn test_cache_maintenance_forwards() {
        let service = FundamentalsService::new(&MarketSettings::default());
        service
            .cache
            .insert(FundamentalsRecord::empty("sh600000", FundamentalsSource::Akshare));

        assert_eq!(service.clear_expired_cache(), 0);
        service.clear_cache();
        assert_eq!(service.cached_count(), 0);
    }
}
