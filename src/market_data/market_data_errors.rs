use thiserror::Error;

use crate::market_data::market_data_model::DataKind;

/// One provider's failure inside an exhausted failover pass.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum MarketDataError {
    /// Network or parse failure for a single provider. Recovered by
    /// failover; never escapes `FailoverManager::resolve`.
    #[error("Provider '{provider}' unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// Local request ceiling reached; no network attempt was made.
    #[error("Provider '{provider}' rate limited locally")]
    RateLimited { provider: String },

    /// Every candidate provider failed for the requested kind.
    #[error("All providers failed: [{}]", format_failures(.0))]
    AllProvidersFailed(Vec<ProviderFailure>),

    /// No live fetch has ever succeeded and no snapshot of any vintage
    /// exists for the requested kind.
    #[error("No cached data available for {0}")]
    NoCacheAvailable(DataKind),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parsing error: {0}")]
    Parse(String),
}

impl MarketDataError {
    /// Collapse transport-level variants into a uniform per-provider
    /// failure record for the aggregate error.
    pub fn into_provider_failure(self, provider: &str) -> ProviderFailure {
        match self {
            MarketDataError::ProviderUnavailable { provider, reason } => {
                ProviderFailure { provider, reason }
            }
            MarketDataError::RateLimited { provider } => ProviderFailure {
                provider,
                reason: "rate limited".to_string(),
            },
            other => ProviderFailure {
                provider: provider.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from the durable snapshot store. Load paths degrade instead of
/// surfacing these; save paths log them.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
