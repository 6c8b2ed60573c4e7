//! Fundamentals pipeline error types

use thiserror::Error;

use crate::market_data::market_data_errors::ProviderFailure;

/// Errors that can occur while resolving company financial statements
#[derive(Error, Debug)]
pub enum FundamentalsError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse a provider response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Upstream rejected or could not serve the request
    #[error("Provider '{provider}' unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// Token-gated provider selected without a configured token
    #[error("Tushare token is not configured")]
    TokenMissing,

    /// The instrument code cannot be mapped to a provider symbol
    #[error("Invalid instrument code: {0}")]
    InvalidCode(String),

    /// Provider returned a well-formed but empty result
    #[error("No fundamentals available for {0}")]
    NoData(String),

    /// Both providers failed for the requested code
    #[error("All fundamentals providers failed: [{}]", format_failures(.0))]
    AllProvidersFailed(Vec<ProviderFailure>),
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
