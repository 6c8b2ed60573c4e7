//! Settings consumed from the host application.
//!
//! The core never persists these; the hosting application owns storage and
//! hands a fresh copy to `MarketDataService::update_settings` whenever the
//! user changes them.

use serde::{Deserialize, Serialize};

/// Which fundamentals provider to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourcePriority {
    Tushare,
    Akshare,
}

impl Default for DataSourcePriority {
    fn default() -> Self {
        DataSourcePriority::Akshare
    }
}

/// Outbound HTTP proxy, applied to every provider client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySettings {
    /// e.g. "http://127.0.0.1:7890"
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSettings {
    /// Base refresh interval; the trading calendar scales it per session.
    pub refresh_interval_secs: u64,
    pub data_source_priority: DataSourcePriority,
    pub tushare_token: String,
    /// Instrument codes the refresh loop keeps warm.
    pub tracked_codes: Vec<String>,
    pub proxy: Option<ProxySettings>,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 15,
            data_source_priority: DataSourcePriority::default(),
            tushare_token: String::new(),
            tracked_codes: Vec::new(),
            proxy: None,
        }
    }
}
