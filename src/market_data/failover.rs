//! Source failover: try providers in priority order, record status,
//! return the first success.

use dashmap::DashMap;
use chrono::Utc;
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;

use crate::market_data::market_data_constants::DEMOTION_FAILURE_THRESHOLD;
use crate::market_data::market_data_errors::{MarketDataError, ProviderFailure};
use crate::market_data::market_data_model::{DataKind, FetchRequest, MarketPayload, ProviderStatus};
use crate::market_data::fetch::RateLimitedFetcher;
use crate::market_data::providers::market_data_provider::MarketDataProvider;

/// Priority order for one kind: configuration order, with providers past
/// the consecutive-failure threshold moved to the back. Stable within
/// each group, pure, and independently testable.
pub fn order_candidates(
    ids: Vec<String>,
    consecutive_failures: &HashMap<String, u32>,
    threshold: u32,
) -> Vec<String> {
    let (healthy, demoted): (Vec<String>, Vec<String>) = ids.into_iter().partition(|id| {
        consecutive_failures.get(id).copied().unwrap_or(0) < threshold
    });
    healthy.into_iter().chain(demoted).collect()
}

pub struct FailoverManager {
    /// Registration order is the configured priority order.
    providers: Vec<Arc<dyn MarketDataProvider>>,
    fetcher: RateLimitedFetcher,
    statuses: DashMap<(DataKind, String), ProviderStatus>,
}

impl FailoverManager {
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>, fetcher: RateLimitedFetcher) -> Self {
        let statuses = DashMap::new();
        for kind in std::iter::once(DataKind::RealtimeQuotes).chain(DataKind::SNAPSHOT_KINDS) {
            for provider in providers.iter().filter(|p| p.supports(kind)) {
                statuses.insert(
                    (kind, provider.id().to_string()),
                    ProviderStatus::new(kind, provider.id()),
                );
            }
        }
        Self {
            providers,
            fetcher,
            statuses,
        }
    }

    /// Candidate ids for `kind` in the order `resolve` will try them.
    pub fn candidate_order(&self, kind: DataKind) -> Vec<String> {
        let ids: Vec<String> = self
            .providers
            .iter()
            .filter(|p| p.supports(kind))
            .map(|p| p.id().to_string())
            .collect();

        let failures: HashMap<String, u32> = ids
            .iter()
            .map(|id| {
                let count = self
                    .statuses
                    .get(&(kind, id.clone()))
                    .map(|s| s.consecutive_failures)
                    .unwrap_or(0);
                (id.clone(), count)
            })
            .collect();

        order_candidates(ids, &failures, DEMOTION_FAILURE_THRESHOLD)
    }

    /// First successful payload for the request, with the id of the
    /// provider that produced it. Exhaustion yields an aggregate error
    /// listing every candidate's failure.
    pub async fn resolve(
        &self,
        request: &FetchRequest,
    ) -> Result<(MarketPayload, String), MarketDataError> {
        let order = self.candidate_order(request.kind);
        let mut failures: Vec<ProviderFailure> = Vec::new();

        for id in order {
            let provider = match self.providers.iter().find(|p| p.id() == id) {
                Some(p) => p.clone(),
                None => continue,
            };

            match self.fetcher.fetch(&provider, request).await {
                Ok(payload) => {
                    self.record_success(request.kind, &id);
                    return Ok((payload, id));
                }
                Err(e) => {
                    // A local rate refusal never reached the network, so it
                    // does not count toward demotion.
                    let counts_toward_demotion =
                        !matches!(e, MarketDataError::RateLimited { .. });
                    warn!(
                        "Provider '{}' failed for {}: {}. Trying next.",
                        id, request.kind, e
                    );
                    let failure = e.into_provider_failure(&id);
                    self.record_failure(request.kind, &id, &failure.reason, counts_toward_demotion);
                    failures.push(failure);
                }
            }
        }

        if failures.is_empty() {
            warn!("No providers registered for {}", request.kind);
        }
        Err(MarketDataError::AllProvidersFailed(failures))
    }

    fn record_success(&self, kind: DataKind, provider: &str) {
        let mut status = self
            .statuses
            .entry((kind, provider.to_string()))
            .or_insert_with(|| ProviderStatus::new(kind, provider));
        status.available = true;
        status.last_success = Some(Utc::now());
        status.last_error = None;
        status.consecutive_failures = 0;
    }

    fn record_failure(&self, kind: DataKind, provider: &str, reason: &str, count: bool) {
        let mut status = self
            .statuses
            .entry((kind, provider.to_string()))
            .or_insert_with(|| ProviderStatus::new(kind, provider));
        status.available = false;
        status.last_error = Some(reason.to_string());
        if count {
            status.consecutive_failures += 1;
        }
    }

    /// Snapshot of every (kind, provider) status for diagnostics display.
    pub fn status_list(&self) -> Vec<ProviderStatus> {
        let mut list: Vec<ProviderStatus> =
            self.statuses.iter().map(|entry| entry.value().clone()).collect();
        list.sort_by(|a, b| {
            a.kind
                .as_str()
                .cmp(b.kind.as_str())
                .then_with(|| a.provider.cmp(&b.provider))
        });
        list
    }
}
