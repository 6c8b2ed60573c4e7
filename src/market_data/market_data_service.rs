//! Market data facade owned by the host's composition root.
//!
//! Coordinates the failover manager, response cache, rate limiter and
//! durable snapshot store behind synchronous-feeling query functions.
//! Query calls read the in-process state first and only block on the
//! network on a miss; the background refresh loop is the writer.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;

use crate::calendar;
use crate::market_data::failover::FailoverManager;
use crate::market_data::fetch::RateLimitedFetcher;
use crate::market_data::market_data_constants::{
    FIRST_LOAD_CONCURRENCY_LIMIT, QUOTE_PREFETCH_BATCH,
};
use crate::market_data::market_data_errors::MarketDataError;
use crate::market_data::market_data_model::{
    normalize_stock_code, DataKind, FetchRequest, GlobalIndex, HotTopic, IndustryRank,
    LongShortEntry, MarketIndex, MarketPayload, MarketSentiment, MoneyFlowEntry, NewsItem,
    ProviderStatus, Quote, SnapshotEntry,
};
use crate::market_data::providers::eastmoney_provider::EastmoneyProvider;
use crate::market_data::providers::market_data_provider::MarketDataProvider;
use crate::market_data::providers::sina_provider::SinaProvider;
use crate::market_data::providers::tencent_provider::TencentProvider;
use crate::market_data::rate_limit::{RateLimiter, RateWindowStats};
use crate::market_data::response_cache::{ResponseCache, ResponseCacheStats};
use crate::market_data::snapshot_store::SnapshotStore;
use crate::settings::MarketSettings;

/// Age of one in-process snapshot entry, for diagnostics display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAge {
    pub kind: DataKind,
    pub captured_at: DateTime<Utc>,
    pub age_secs: i64,
}

/// Cache, rate-limiter and provider statistics in one view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDiagnostics {
    pub first_load: bool,
    pub cache: ResponseCacheStats,
    pub rate_windows: Vec<RateWindowStats>,
    pub providers: Vec<ProviderStatus>,
    pub snapshots: Vec<SnapshotAge>,
}

pub struct MarketDataService {
    failover: FailoverManager,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
    snapshot_store: Arc<SnapshotStore>,
    quotes: RwLock<HashMap<String, Quote>>,
    snapshots: RwLock<HashMap<DataKind, SnapshotEntry>>,
    settings: RwLock<MarketSettings>,
    first_load: AtomicBool,
    warmup_gate: Semaphore,
}

impl MarketDataService {
    /// Service with the standard provider set. Priority order: Sina,
    /// Tencent, Eastmoney for quotes/indices; Eastmoney for the
    /// aggregate kinds.
    pub fn new<P: AsRef<Path>>(settings: MarketSettings, snapshot_path: P) -> Self {
        let proxy = settings.proxy.clone();
        let providers: Vec<Arc<dyn MarketDataProvider>> = vec![
            Arc::new(SinaProvider::new(proxy.as_ref())),
            Arc::new(TencentProvider::new(proxy.as_ref())),
            Arc::new(EastmoneyProvider::new(proxy.as_ref())),
        ];
        Self::with_providers(settings, snapshot_path, providers)
    }

    /// Service over an explicit provider list (tests, host overrides).
    pub fn with_providers<P: AsRef<Path>>(
        settings: MarketSettings,
        snapshot_path: P,
        providers: Vec<Arc<dyn MarketDataProvider>>,
    ) -> Self {
        let cache = Arc::new(ResponseCache::new());
        let limiter = Arc::new(RateLimiter::new());
        let fetcher = RateLimitedFetcher::new(cache.clone(), limiter.clone());
        let failover = FailoverManager::new(providers, fetcher);

        Self {
            failover,
            cache,
            limiter,
            snapshot_store: Arc::new(SnapshotStore::new(snapshot_path)),
            quotes: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
            settings: RwLock::new(settings),
            first_load: AtomicBool::new(true),
            warmup_gate: Semaphore::new(FIRST_LOAD_CONCURRENCY_LIMIT),
        }
    }

    /// Load the durable snapshot into the in-process maps so queries can
    /// be answered before any network fetch has completed.
    pub async fn initialize(&self) {
        let loaded = self.snapshot_store.load().await;
        if loaded.is_empty() {
            info!("No durable snapshot; starting cold");
            return;
        }
        let count = loaded.len();
        let mut snapshots = self.snapshots.write().await;
        for (kind, entry) in loaded {
            snapshots.entry(kind).or_insert(entry);
        }
        info!("Restored {} snapshot kinds from disk", count);
    }

    pub fn is_first_load(&self) -> bool {
        self.first_load.load(Ordering::SeqCst)
    }

    /// The UI signals the initial paint is done; refreshes drop to the
    /// serialized adaptive-interval loop.
    pub fn mark_first_load_complete(&self) {
        if self.first_load.swap(false, Ordering::SeqCst) {
            info!("First load complete");
        }
    }

    /// Swap the consumed settings. Refresh interval and tracked codes
    /// take effect on the next cycle; a proxy change applies to clients
    /// built afterwards.
    pub async fn update_settings(&self, settings: MarketSettings) {
        *self.settings.write().await = settings;
    }

    // ---- query functions -------------------------------------------------

    /// Current quotes for the given codes, serving the in-process map
    /// when it covers every requested code.
    pub async fn get_quotes(&self, codes: &[String]) -> Result<Vec<Quote>, MarketDataError> {
        let normalized: Vec<String> = codes.iter().map(|c| normalize_stock_code(c)).collect();
        {
            let map = self.quotes.read().await;
            if !normalized.is_empty() && normalized.iter().all(|c| map.contains_key(c)) {
                return Ok(normalized.iter().map(|c| map[c].clone()).collect());
            }
        }

        let request = FetchRequest::quotes(&normalized);
        let payload = self.resolve_with_fallback(&request).await?;
        payload
            .into_quotes()
            .ok_or_else(unexpected_payload)
    }

    pub async fn get_market_index(&self) -> Result<Vec<MarketIndex>, MarketDataError> {
        self.kind_payload(DataKind::MarketIndex)
            .await?
            .into_index_list()
            .ok_or_else(unexpected_payload)
    }

    pub async fn get_industry_ranking(&self) -> Result<Vec<IndustryRank>, MarketDataError> {
        self.kind_payload(DataKind::IndustryRank)
            .await?
            .into_industry_ranking()
            .ok_or_else(unexpected_payload)
    }

    pub async fn get_money_flow(&self) -> Result<Vec<MoneyFlowEntry>, MarketDataError> {
        self.kind_payload(DataKind::MoneyFlow)
            .await?
            .into_money_flow()
            .ok_or_else(unexpected_payload)
    }

    pub async fn get_news(&self) -> Result<Vec<NewsItem>, MarketDataError> {
        self.kind_payload(DataKind::News)
            .await?
            .into_news()
            .ok_or_else(unexpected_payload)
    }

    pub async fn get_long_short_ranking(&self) -> Result<Vec<LongShortEntry>, MarketDataError> {
        self.kind_payload(DataKind::LongShortRank)
            .await?
            .into_long_short_ranking()
            .ok_or_else(unexpected_payload)
    }

    pub async fn get_hot_topics(&self) -> Result<Vec<HotTopic>, MarketDataError> {
        self.kind_payload(DataKind::HotTopics)
            .await?
            .into_hot_topics()
            .ok_or_else(unexpected_payload)
    }

    pub async fn get_global_index(&self) -> Result<Vec<GlobalIndex>, MarketDataError> {
        self.kind_payload(DataKind::GlobalIndex)
            .await?
            .into_global_index_list()
            .ok_or_else(unexpected_payload)
    }

    pub async fn get_global_news(
        &self,
    ) -> Result<HashMap<String, Vec<NewsItem>>, MarketDataError> {
        self.kind_payload(DataKind::GlobalNews)
            .await?
            .into_global_news()
            .ok_or_else(unexpected_payload)
    }

    pub async fn get_global_sentiment(&self) -> Result<Vec<MarketSentiment>, MarketDataError> {
        self.kind_payload(DataKind::GlobalSentiment)
            .await?
            .into_global_sentiment()
            .ok_or_else(unexpected_payload)
    }

    /// In-process snapshot entry for instant display; never fetches.
    pub async fn get_cached_snapshot(&self, kind: DataKind) -> Option<SnapshotEntry> {
        self.snapshots.read().await.get(&kind).cloned()
    }

    // ---- maintenance -----------------------------------------------------

    /// Evict expired response-cache records; returns the eviction count.
    pub fn cleanup_expired_cache(&self) -> usize {
        self.cache.cleanup_expired()
    }

    /// Unconditional response-cache flush (user-forced refresh).
    pub fn clear_all_cache(&self) {
        self.cache.clear_all();
    }

    pub fn provider_status_list(&self) -> Vec<ProviderStatus> {
        self.failover.status_list()
    }

    pub async fn diagnostics(&self) -> MarketDiagnostics {
        let now = Utc::now();
        let snapshots = self.snapshots.read().await;
        let mut ages: Vec<SnapshotAge> = snapshots
            .values()
            .map(|entry| SnapshotAge {
                kind: entry.kind,
                captured_at: entry.captured_at,
                age_secs: (now - entry.captured_at).num_seconds(),
            })
            .collect();
        ages.sort_by(|a, b| a.kind.as_str().cmp(b.kind.as_str()));

        MarketDiagnostics {
            first_load: self.is_first_load(),
            cache: self.cache.stats(),
            rate_windows: self.limiter.stats(),
            providers: self.failover.status_list(),
            snapshots: ages,
        }
    }

    // ---- background refresh ----------------------------------------------

    /// Concurrent fan-out over every tracked kind, bounded by the warm-up
    /// gate. Used while first load is in progress.
    pub async fn warm_up(&self) {
        let tracked = self.settings.read().await.tracked_codes.clone();
        let mut requests: Vec<FetchRequest> = DataKind::SNAPSHOT_KINDS
            .into_iter()
            .map(FetchRequest::kind)
            .collect();
        if !tracked.is_empty() {
            requests.push(FetchRequest::quotes(&tracked));
        }

        join_all(requests.into_iter().map(|r| self.refresh_gated(r))).await;
    }

    /// Warm the quote map for the given codes with bounded concurrency.
    pub async fn prefetch_quotes(&self, codes: &[String]) {
        let normalized: Vec<String> = codes.iter().map(|c| normalize_stock_code(c)).collect();
        let requests: Vec<FetchRequest> = normalized
            .chunks(QUOTE_PREFETCH_BATCH)
            .map(FetchRequest::quotes)
            .collect();
        join_all(requests.into_iter().map(|r| self.refresh_gated(r))).await;
    }

    /// One serialized refresh pass over every tracked kind.
    pub async fn refresh_once(&self) {
        let tracked = self.settings.read().await.tracked_codes.clone();
        if !tracked.is_empty() {
            self.refresh_kind(FetchRequest::quotes(&tracked)).await;
        }
        for kind in DataKind::SNAPSHOT_KINDS {
            self.refresh_kind(FetchRequest::kind(kind)).await;
        }
    }

    /// Periodic refresh at the calendar-scaled interval. First-load
    /// cycles fan out concurrently; afterwards each cycle is serial.
    pub fn spawn_refresh_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if self.is_first_load() {
                    self.warm_up().await;
                } else {
                    self.refresh_once().await;
                }

                let base =
                    Duration::from_secs(self.settings.read().await.refresh_interval_secs.max(1));
                let interval = calendar::compute_refresh_interval(base);
                debug!("Next refresh in {:?}", interval);
                tokio::time::sleep(interval).await;
            }
        })
    }

    async fn refresh_gated(&self, request: FetchRequest) {
        let _permit = match self.warmup_gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        self.refresh_kind(request).await;
    }

    async fn refresh_kind(&self, request: FetchRequest) {
        match self.failover.resolve(&request).await {
            Ok((payload, source)) => {
                debug!("Refreshed {} via {}", request.kind, source);
                self.store_success(&payload).await;
            }
            // A failed fetch never overwrites existing entries.
            Err(e) => warn!("Refresh for {} failed: {}", request.kind, e),
        }
    }

    // ---- internals -------------------------------------------------------

    async fn kind_payload(&self, kind: DataKind) -> Result<MarketPayload, MarketDataError> {
        if let Some(entry) = self.get_cached_snapshot(kind).await {
            return Ok(entry.payload);
        }
        self.resolve_with_fallback(&FetchRequest::kind(kind)).await
    }

    /// Resolve through failover; on total failure fall back to the last
    /// in-process value of any vintage, then the durable snapshot, and
    /// only then surface `NoCacheAvailable`.
    async fn resolve_with_fallback(
        &self,
        request: &FetchRequest,
    ) -> Result<MarketPayload, MarketDataError> {
        match self.failover.resolve(request).await {
            Ok((payload, source)) => {
                debug!("Resolved {} via {}", request.kind, source);
                self.store_success(&payload).await;
                Ok(payload)
            }
            Err(err) => {
                warn!("Resolve for {} failed: {}", request.kind, err);
                self.fallback_payload(request).await.ok_or_else(|| {
                    MarketDataError::NoCacheAvailable(request.kind)
                })
            }
        }
    }

    async fn fallback_payload(&self, request: &FetchRequest) -> Option<MarketPayload> {
        if request.kind == DataKind::RealtimeQuotes {
            let map = self.quotes.read().await;
            let cached: Vec<Quote> = request
                .codes
                .iter()
                .filter_map(|code| map.get(code).cloned())
                .collect();
            if cached.is_empty() {
                return None;
            }
            warn!("Serving {} stale quotes after provider exhaustion", cached.len());
            return Some(MarketPayload::Quotes(cached));
        }

        if let Some(entry) = self.get_cached_snapshot(request.kind).await {
            warn!(
                "Serving stale {} snapshot from {} after provider exhaustion",
                request.kind, entry.captured_at
            );
            return Some(entry.payload);
        }

        let disk = self.snapshot_store.load().await;
        if let Some(entry) = disk.get(&request.kind) {
            warn!(
                "Serving durable {} snapshot from {} after provider exhaustion",
                request.kind, entry.captured_at
            );
            return Some(entry.payload.clone());
        }
        None
    }

    /// Publish a successful payload into the in-process maps, skipping
    /// anything older than what is already there, and schedule the
    /// durable write off the request path.
    async fn store_success(&self, payload: &MarketPayload) {
        match payload {
            MarketPayload::Quotes(quotes) => {
                let mut map = self.quotes.write().await;
                for quote in quotes {
                    match map.get(&quote.code) {
                        Some(existing) if existing.timestamp > quote.timestamp => {
                            debug!("Skipping stale quote for {}", quote.code);
                        }
                        _ => {
                            map.insert(quote.code.clone(), quote.clone());
                        }
                    }
                }
            }
            other => {
                let entry = SnapshotEntry::new(other.clone());
                {
                    let mut map = self.snapshots.write().await;
                    match map.get(&entry.kind) {
                        Some(existing) if existing.captured_at > entry.captured_at => {
                            debug!("Skipping stale snapshot for {}", entry.kind);
                            return;
                        }
                        _ => {
                            map.insert(entry.kind, entry.clone());
                        }
                    }
                }

                let store = self.snapshot_store.clone();
                tokio::spawn(async move {
                    if let Err(e) = store.save(entry).await {
                        warn!("Durable snapshot write failed: {}", e);
                    }
                });
            }
        }
    }
}

fn unexpected_payload() -> MarketDataError {
    MarketDataError::Parse("payload kind does not match request".to_string())
}
