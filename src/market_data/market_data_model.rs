use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Domain model representing a realtime market quote.
///
/// Keyed by normalized instrument code (`sh600000`, `sz000001`, ...);
/// overwritten on every successful refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub code: String,
    pub name: String,
    pub last: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub prev_close: Decimal,
    pub volume: Decimal,
    pub turnover: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// One row of the domestic index board (SSE composite, SZSE component, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketIndex {
    pub code: String,
    pub name: String,
    pub current: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
}

/// Industry board ranking row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryRank {
    pub code: String,
    pub name: String,
    pub change_percent: Decimal,
    pub main_net_inflow: Decimal,
    pub leading_stock: String,
    pub leading_stock_change_percent: Decimal,
}

/// Main-force money flow ranking row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyFlowEntry {
    pub code: String,
    pub name: String,
    pub change_percent: Decimal,
    pub main_net_inflow: Decimal,
    pub main_net_inflow_percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub source: String,
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

/// Long/short positioning ranking row (top net buys vs top net sells).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongShortEntry {
    pub code: String,
    pub name: String,
    pub change_percent: Decimal,
    pub net_inflow: Decimal,
    pub side: PositionSide,
}

/// Hot concept board row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotTopic {
    pub code: String,
    pub name: String,
    pub change_percent: Decimal,
    pub leading_stock: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalIndex {
    pub code: String,
    pub name: String,
    pub country: String,
    pub current: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Bullish,
    Neutral,
    Bearish,
}

/// Per-country market sentiment derived from regional index breadth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSentiment {
    pub country: String,
    pub advancing: u32,
    pub declining: u32,
    pub score: Decimal,
    pub label: SentimentLabel,
}

/// Response cache partitions with kind-specific expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CachePartition {
    Quote,
    News,
    Report,
    Notice,
}

impl CachePartition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePartition::Quote => "QUOTE",
            CachePartition::News => "NEWS",
            CachePartition::Report => "REPORT",
            CachePartition::Notice => "NOTICE",
        }
    }

    /// TTL in seconds for records stored in this partition.
    pub fn ttl_secs(&self) -> i64 {
        use super::market_data_constants::*;
        match self {
            CachePartition::Quote => QUOTE_CACHE_TTL_SECS,
            CachePartition::News => NEWS_CACHE_TTL_SECS,
            CachePartition::Report => REPORT_CACHE_TTL_SECS,
            CachePartition::Notice => NOTICE_CACHE_TTL_SECS,
        }
    }
}

/// Closed enumeration of the logical data kinds the core tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    RealtimeQuotes,
    MarketIndex,
    IndustryRank,
    MoneyFlow,
    News,
    LongShortRank,
    HotTopics,
    GlobalIndex,
    GlobalNews,
    GlobalSentiment,
}

impl DataKind {
    /// Every kind the durable snapshot persists (quotes are per-code and
    /// refreshed too frequently to be worth a disk copy).
    pub const SNAPSHOT_KINDS: [DataKind; 9] = [
        DataKind::MarketIndex,
        DataKind::IndustryRank,
        DataKind::MoneyFlow,
        DataKind::News,
        DataKind::LongShortRank,
        DataKind::HotTopics,
        DataKind::GlobalIndex,
        DataKind::GlobalNews,
        DataKind::GlobalSentiment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::RealtimeQuotes => "REALTIME_QUOTES",
            DataKind::MarketIndex => "MARKET_INDEX",
            DataKind::IndustryRank => "INDUSTRY_RANK",
            DataKind::MoneyFlow => "MONEY_FLOW",
            DataKind::News => "NEWS",
            DataKind::LongShortRank => "LONG_SHORT_RANK",
            DataKind::HotTopics => "HOT_TOPICS",
            DataKind::GlobalIndex => "GLOBAL_INDEX",
            DataKind::GlobalNews => "GLOBAL_NEWS",
            DataKind::GlobalSentiment => "GLOBAL_SENTIMENT",
        }
    }

    pub fn is_snapshot_kind(&self) -> bool {
        !matches!(self, DataKind::RealtimeQuotes)
    }

    /// Which response-cache partition holds this kind's raw fetches.
    pub fn cache_partition(&self) -> CachePartition {
        match self {
            DataKind::RealtimeQuotes
            | DataKind::MarketIndex
            | DataKind::GlobalIndex
            | DataKind::GlobalSentiment => CachePartition::Quote,
            DataKind::News | DataKind::GlobalNews | DataKind::HotTopics => CachePartition::News,
            DataKind::IndustryRank | DataKind::MoneyFlow => CachePartition::Report,
            DataKind::LongShortRank => CachePartition::Notice,
        }
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "REALTIME_QUOTES" => Ok(DataKind::RealtimeQuotes),
            "MARKET_INDEX" => Ok(DataKind::MarketIndex),
            "INDUSTRY_RANK" => Ok(DataKind::IndustryRank),
            "MONEY_FLOW" => Ok(DataKind::MoneyFlow),
            "NEWS" => Ok(DataKind::News),
            "LONG_SHORT_RANK" => Ok(DataKind::LongShortRank),
            "HOT_TOPICS" => Ok(DataKind::HotTopics),
            "GLOBAL_INDEX" => Ok(DataKind::GlobalIndex),
            "GLOBAL_NEWS" => Ok(DataKind::GlobalNews),
            "GLOBAL_SENTIMENT" => Ok(DataKind::GlobalSentiment),
            _ => Err(format!("Unknown data kind: {}", s)),
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One successfully fetched payload, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketPayload {
    Quotes(Vec<Quote>),
    IndexList(Vec<MarketIndex>),
    IndustryRanking(Vec<IndustryRank>),
    MoneyFlow(Vec<MoneyFlowEntry>),
    News(Vec<NewsItem>),
    LongShortRanking(Vec<LongShortEntry>),
    HotTopics(Vec<HotTopic>),
    GlobalIndexList(Vec<GlobalIndex>),
    GlobalNews(HashMap<String, Vec<NewsItem>>),
    GlobalSentiment(Vec<MarketSentiment>),
}

impl MarketPayload {
    pub fn kind(&self) -> DataKind {
        match self {
            MarketPayload::Quotes(_) => DataKind::RealtimeQuotes,
            MarketPayload::IndexList(_) => DataKind::MarketIndex,
            MarketPayload::IndustryRanking(_) => DataKind::IndustryRank,
            MarketPayload::MoneyFlow(_) => DataKind::MoneyFlow,
            MarketPayload::News(_) => DataKind::News,
            MarketPayload::LongShortRanking(_) => DataKind::LongShortRank,
            MarketPayload::HotTopics(_) => DataKind::HotTopics,
            MarketPayload::GlobalIndexList(_) => DataKind::GlobalIndex,
            MarketPayload::GlobalNews(_) => DataKind::GlobalNews,
            MarketPayload::GlobalSentiment(_) => DataKind::GlobalSentiment,
        }
    }

    pub fn into_quotes(self) -> Option<Vec<Quote>> {
        match self {
            MarketPayload::Quotes(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_index_list(self) -> Option<Vec<MarketIndex>> {
        match self {
            MarketPayload::IndexList(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_industry_ranking(self) -> Option<Vec<IndustryRank>> {
        match self {
            MarketPayload::IndustryRanking(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_money_flow(self) -> Option<Vec<MoneyFlowEntry>> {
        match self {
            MarketPayload::MoneyFlow(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_news(self) -> Option<Vec<NewsItem>> {
        match self {
            MarketPayload::News(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_long_short_ranking(self) -> Option<Vec<LongShortEntry>> {
        match self {
            MarketPayload::LongShortRanking(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_hot_topics(self) -> Option<Vec<HotTopic>> {
        match self {
            MarketPayload::HotTopics(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_global_index_list(self) -> Option<Vec<GlobalIndex>> {
        match self {
            MarketPayload::GlobalIndexList(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_global_news(self) -> Option<HashMap<String, Vec<NewsItem>>> {
        match self {
            MarketPayload::GlobalNews(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_global_sentiment(self) -> Option<Vec<MarketSentiment>> {
        match self {
            MarketPayload::GlobalSentiment(v) => Some(v),
            _ => None,
        }
    }
}

/// Last-known-good payload for one kind, as held in process and on disk.
///
/// Only replaced by a strictly newer successful fetch; a failed fetch
/// never overwrites an existing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub kind: DataKind,
    pub captured_at: DateTime<Utc>,
    pub payload: MarketPayload,
}

impl SnapshotEntry {
    pub fn new(payload: MarketPayload) -> Self {
        Self {
            kind: payload.kind(),
            captured_at: Utc::now(),
            payload,
        }
    }
}

/// Per (kind, provider) availability record, owned by the failover manager.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub kind: DataKind,
    pub provider: String,
    pub available: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl ProviderStatus {
    pub fn new(kind: DataKind, provider: &str) -> Self {
        Self {
            kind,
            provider: provider.to_string(),
            available: true,
            last_success: None,
            last_error: None,
            consecutive_failures: 0,
        }
    }
}

/// One logical fetch: a kind plus its normalized parameters.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub kind: DataKind,
    pub codes: Vec<String>,
}

impl FetchRequest {
    pub fn kind(kind: DataKind) -> Self {
        Self { kind, codes: Vec::new() }
    }

    pub fn quotes(codes: &[String]) -> Self {
        Self {
            kind: DataKind::RealtimeQuotes,
            codes: codes.iter().map(|c| normalize_stock_code(c)).collect(),
        }
    }

    /// Stable cache key: provider + kind + sorted request parameters.
    pub fn fingerprint(&self, provider_id: &str) -> String {
        let mut codes = self.codes.clone();
        codes.sort();
        format!("{}:{}:{}", provider_id, self.kind.as_str(), codes.join(","))
    }
}

/// Normalize an instrument code to the exchange-prefixed lowercase form
/// providers expect: `600000` -> `sh600000`, `SZ000001` -> `sz000001`.
pub fn normalize_stock_code(code: &str) -> String {
    let trimmed = code.trim().to_lowercase();
    if trimmed.len() == 8
        && (trimmed.starts_with("sh") || trimmed.starts_with("sz") || trimmed.starts_with("bj"))
    {
        return trimmed;
    }
    if trimmed.len() == 6 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        let prefix = match trimmed.as_bytes()[0] {
            b'6' | b'9' | b'5' => "sh",
            b'0' | b'2' | b'3' => "sz",
            b'4' | b'8' => "bj",
            _ => return trimmed,
        };
        return format!("{}{}", prefix, trimmed);
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_normalize_stock_code() {
        assert_eq!(normalize_stock_code("600000"), "sh600000");
        assert_eq!(normalize_stock_code("000001"), "sz000001");
        assert_eq!(normalize_stock_code("300750"), "sz300750");
        assert_eq!(normalize_stock_code("830799"), "bj830799");
        assert_eq!(normalize_stock_code("SH600000"), "sh600000");
        assert_eq!(normalize_stock_code(" sz000001 "), "sz000001");
        assert_eq!(normalize_stock_code("510300"), "sh510300");
    }

    #[test]
    fn test_data_kind_string_roundtrip() {
        for kind in DataKind::SNAPSHOT_KINDS {
            assert_eq!(kind.as_str().parse::<DataKind>().unwrap(), kind);
        }
        assert_eq!(
            "realtime_quotes".parse::<DataKind>().unwrap(),
            DataKind::RealtimeQuotes
        );
        assert!("SOMETHING_ELSE".parse::<DataKind>().is_err());
    }

    #[test]
    fn test_quotes_are_not_a_snapshot_kind() {
        assert!(!DataKind::RealtimeQuotes.is_snapshot_kind());
        assert!(DataKind::SNAPSHOT_KINDS.iter().all(|k| k.is_snapshot_kind()));
    }

    #[test]
    fn test_fingerprint_is_order_insensitive() {
        let a = FetchRequest::quotes(&["600000".to_string(), "000001".to_string()]);
        let b = FetchRequest::quotes(&["sz000001".to_string(), "sh600000".to_string()]);
        assert_eq!(a.fingerprint("SINA"), b.fingerprint("SINA"));
        assert_ne!(a.fingerprint("SINA"), a.fingerprint("TENCENT"));
    }

    #[test]
    fn test_payload_kind_matches_accessor() {
        let payload = MarketPayload::IndexList(vec![MarketIndex {
            code: "sh000001".to_string(),
            name: "SSE Composite".to_string(),
            current: dec!(3231.41),
            change: dec!(-12.37),
            change_percent: dec!(-0.38),
        }]);
        assert_eq!(payload.kind(), DataKind::MarketIndex);
        assert!(payload.clone().into_news().is_none());
        assert_eq!(payload.into_index_list().unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_entry_serde_roundtrip() {
        let entry = SnapshotEntry::new(MarketPayload::HotTopics(vec![HotTopic {
            code: "BK0493".to_string(),
            name: "AI compute".to_string(),
            change_percent: dec!(4.2),
            leading_stock: "sz300750".to_string(),
        }]));
        let json = serde_json::to_string(&entry).unwrap();
        let back: SnapshotEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, DataKind::HotTopics);
        assert_eq!(back.captured_at, entry.captured_at);
    }
}
