//! Eastmoney push2/list APIs: board rankings, main-force money flow,
//! fast news and global index data.
//!
//! Numeric fields arrive as JSON numbers, or `"-"` while an instrument
//! is suspended, so rows are extracted from `serde_json::Value` rather
//! than typed structs.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use reqwest::Client;
use std::collections::HashMap;

use crate::market_data::market_data_constants::PROVIDER_EASTMONEY;
use crate::market_data::market_data_errors::MarketDataError;
use crate::market_data::market_data_model::{
    DataKind, FetchRequest, GlobalIndex, HotTopic, IndustryRank, LongShortEntry, MarketPayload,
    MarketSentiment, MoneyFlowEntry, NewsItem, PositionSide, SentimentLabel,
};
use crate::market_data::providers::headers::{build_client, eastmoney_headers};
use crate::market_data::providers::market_data_provider::MarketDataProvider;
use crate::settings::ProxySettings;

const CLIST_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";
const ULIST_URL: &str = "https://push2.eastmoney.com/api/qt/ulist.np/get";
const FAST_NEWS_URL: &str = "https://np-listapi.eastmoney.com/comm/web/getFastNewsList";

const RANK_PAGE_SIZE: u32 = 50;
const LONG_SHORT_SIDE_SIZE: usize = 20;

/// Industry boards.
const FS_INDUSTRY_BOARDS: &str = "m:90+t:2";
/// Concept boards.
const FS_CONCEPT_BOARDS: &str = "m:90+t:3";
/// All listed A-shares across both exchanges.
const FS_A_SHARES: &str = "m:0+t:6,m:0+t:80,m:1+t:2,m:1+t:23";

/// secid and home country for the tracked global indices.
const GLOBAL_INDEX_SECIDS: [(&str, &str); 9] = [
    ("100.DJIA", "US"),
    ("100.NDX", "US"),
    ("100.SPX", "US"),
    ("100.N225", "JP"),
    ("100.KS11", "KR"),
    ("100.HSI", "HK"),
    ("100.FTSE", "GB"),
    ("100.GDAXI", "DE"),
    ("100.FCHI", "FR"),
];

/// Fast-news column per covered country feed.
const GLOBAL_NEWS_COLUMNS: [(&str, &str); 4] = [
    ("US", "103"),
    ("HK", "104"),
    ("JP", "105"),
    ("EU", "106"),
];
/// Column of the domestic 7x24 feed.
const DOMESTIC_NEWS_COLUMN: &str = "102";

pub struct EastmoneyProvider {
    client: Client,
}

impl EastmoneyProvider {
    pub fn new(proxy: Option<&ProxySettings>) -> Self {
        Self {
            client: build_client(eastmoney_headers(), proxy),
        }
    }

    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, MarketDataError> {
        let response = self.client.get(url).query(params).send().await?;

        if !response.status().is_success() {
            return Err(MarketDataError::ProviderUnavailable {
                provider: PROVIDER_EASTMONEY.to_string(),
                reason: format!("request failed: {}", response.status()),
            });
        }

        Ok(response.json().await?)
    }

    /// Ranked list rows from the clist endpoint.
    async fn fetch_clist(
        &self,
        fs: &str,
        sort_field: &str,
        descending: bool,
        fields: &str,
        page_size: u32,
    ) -> Result<Vec<Value>, MarketDataError> {
        let params = [
            ("pn", "1".to_string()),
            ("pz", page_size.to_string()),
            ("po", if descending { "1" } else { "0" }.to_string()),
            ("np", "1".to_string()),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
            ("fid", sort_field.to_string()),
            ("fs", fs.to_string()),
            ("fields", fields.to_string()),
        ];
        let body = self.get_json(CLIST_URL, &params).await?;
        diff_rows(&body)
    }

    async fn fetch_industry_ranking(&self) -> Result<MarketPayload, MarketDataError> {
        let rows = self
            .fetch_clist(
                FS_INDUSTRY_BOARDS,
                "f3",
                true,
                "f2,f3,f12,f14,f62,f128,f136",
                RANK_PAGE_SIZE,
            )
            .await?;

        let ranking: Vec<IndustryRank> = rows
            .iter()
            .filter_map(|row| {
                Some(IndustryRank {
                    code: field_string(row, "f12")?,
                    name: field_string(row, "f14")?,
                    change_percent: field_decimal(row, "f3"),
                    main_net_inflow: field_decimal(row, "f62"),
                    leading_stock: field_string(row, "f128").unwrap_or_default(),
                    leading_stock_change_percent: field_decimal(row, "f136"),
                })
            })
            .collect();

        if ranking.is_empty() {
            return Err(MarketDataError::Parse("empty industry board list".to_string()));
        }
        Ok(MarketPayload::IndustryRanking(ranking))
    }

    async fn fetch_hot_topics(&self) -> Result<MarketPayload, MarketDataError> {
        let rows = self
            .fetch_clist(FS_CONCEPT_BOARDS, "f3", true, "f3,f12,f14,f128", RANK_PAGE_SIZE)
            .await?;

        let topics: Vec<HotTopic> = rows
            .iter()
            .filter_map(|row| {
                Some(HotTopic {
                    code: field_string(row, "f12")?,
                    name: field_string(row, "f14")?,
                    change_percent: field_decimal(row, "f3"),
                    leading_stock: field_string(row, "f128").unwrap_or_default(),
                })
            })
            .collect();

        if topics.is_empty() {
            return Err(MarketDataError::Parse("empty concept board list".to_string()));
        }
        Ok(MarketPayload::HotTopics(topics))
    }

    async fn fetch_money_flow(&self) -> Result<MarketPayload, MarketDataError> {
        let rows = self
            .fetch_clist(
                FS_A_SHARES,
                "f62",
                true,
                "f2,f3,f12,f14,f62,f184",
                RANK_PAGE_SIZE,
            )
            .await?;

        let flow: Vec<MoneyFlowEntry> = rows
            .iter()
            .filter_map(|row| {
                Some(MoneyFlowEntry {
                    code: field_string(row, "f12")?,
                    name: field_string(row, "f14")?,
                    change_percent: field_decimal(row, "f3"),
                    main_net_inflow: field_decimal(row, "f62"),
                    main_net_inflow_percent: field_decimal(row, "f184"),
                })
            })
            .collect();

        if flow.is_empty() {
            return Err(MarketDataError::Parse("empty money flow list".to_string()));
        }
        Ok(MarketPayload::MoneyFlow(flow))
    }

    /// Top net buys form the long side, top net sells the short side.
    async fn fetch_long_short_ranking(&self) -> Result<MarketPayload, MarketDataError> {
        let fields = "f3,f12,f14,f62";
        let longs = self
            .fetch_clist(FS_A_SHARES, "f62", true, fields, LONG_SHORT_SIDE_SIZE as u32)
            .await?;
        let shorts = self
            .fetch_clist(FS_A_SHARES, "f62", false, fields, LONG_SHORT_SIDE_SIZE as u32)
            .await?;

        let mut ranking = Vec::with_capacity(longs.len() + shorts.len());
        for (rows, side) in [(longs, PositionSide::Long), (shorts, PositionSide::Short)] {
            for row in &rows {
                if let (Some(code), Some(name)) = (field_string(row, "f12"), field_string(row, "f14"))
                {
                    ranking.push(LongShortEntry {
                        code,
                        name,
                        change_percent: field_decimal(row, "f3"),
                        net_inflow: field_decimal(row, "f62"),
                        side,
                    });
                }
            }
        }

        if ranking.is_empty() {
            return Err(MarketDataError::Parse("empty long/short ranking".to_string()));
        }
        Ok(MarketPayload::LongShortRanking(ranking))
    }

    async fn fetch_global_rows(&self) -> Result<Vec<(Value, &'static str)>, MarketDataError> {
        let secids: Vec<&str> = GLOBAL_INDEX_SECIDS.iter().map(|(id, _)| *id).collect();
        let params = [
            ("fltt", "2".to_string()),
            ("fields", "f2,f3,f4,f12,f14".to_string()),
            ("secids", secids.join(",")),
        ];
        let body = self.get_json(ULIST_URL, &params).await?;
        let rows = diff_rows(&body)?;

        // Pair each row back with its home country by code.
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let code = field_string(&row, "f12")?;
                let country = GLOBAL_INDEX_SECIDS
                    .iter()
                    .find(|(secid, _)| secid.ends_with(&code))
                    .map(|(_, country)| *country)?;
                Some((row, country))
            })
            .collect())
    }

    async fn fetch_global_index_list(&self) -> Result<MarketPayload, MarketDataError> {
        let rows = self.fetch_global_rows().await?;

        let indices: Vec<GlobalIndex> = rows
            .iter()
            .filter_map(|(row, country)| {
                Some(GlobalIndex {
                    code: field_string(row, "f12")?,
                    name: field_string(row, "f14")?,
                    country: country.to_string(),
                    current: field_decimal(row, "f2"),
                    change: field_decimal(row, "f4"),
                    change_percent: field_decimal(row, "f3"),
                })
            })
            .collect();

        if indices.is_empty() {
            return Err(MarketDataError::Parse("empty global index list".to_string()));
        }
        Ok(MarketPayload::GlobalIndexList(indices))
    }

    /// Sentiment per country from the breadth of its tracked indices.
    async fn fetch_global_sentiment(&self) -> Result<MarketPayload, MarketDataError> {
        let rows = self.fetch_global_rows().await?;
        if rows.is_empty() {
            return Err(MarketDataError::Parse("empty global index list".to_string()));
        }

        let mut by_country: HashMap<&str, Vec<Decimal>> = HashMap::new();
        for (row, country) in &rows {
            by_country
                .entry(country)
                .or_default()
                .push(field_decimal(row, "f3"));
        }

        let mut sentiment: Vec<MarketSentiment> = by_country
            .into_iter()
            .map(|(country, changes)| compute_sentiment(country, &changes))
            .collect();
        sentiment.sort_by(|a, b| a.country.cmp(&b.country));

        Ok(MarketPayload::GlobalSentiment(sentiment))
    }

    async fn fetch_fast_news(&self, column: &str) -> Result<Vec<NewsItem>, MarketDataError> {
        let params = [
            ("client", "web".to_string()),
            ("biz", "web_724".to_string()),
            ("fastColumn", column.to_string()),
            ("sortEnd", String::new()),
            ("pageSize", "30".to_string()),
            ("req_trace", "1".to_string()),
        ];
        let body = self.get_json(FAST_NEWS_URL, &params).await?;

        let items = body
            .get("data")
            .and_then(|d| d.get("fastNewsList"))
            .and_then(|l| l.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(items
            .iter()
            .filter_map(|item| {
                let title = field_string(item, "title")
                    .or_else(|| field_string(item, "digest"))?;
                Some(NewsItem {
                    title,
                    source: "eastmoney".to_string(),
                    url: field_string(item, "url_w"),
                    published_at: field_string(item, "showTime")
                        .as_deref()
                        .and_then(parse_cn_datetime)
                        .unwrap_or_else(Utc::now),
                })
            })
            .collect())
    }

    async fn fetch_news(&self) -> Result<MarketPayload, MarketDataError> {
        let news = self.fetch_fast_news(DOMESTIC_NEWS_COLUMN).await?;
        if news.is_empty() {
            return Err(MarketDataError::Parse("empty fast news feed".to_string()));
        }
        Ok(MarketPayload::News(news))
    }

    async fn fetch_global_news(&self) -> Result<MarketPayload, MarketDataError> {
        let mut per_country = HashMap::new();
        for (country, column) in GLOBAL_NEWS_COLUMNS {
            match self.fetch_fast_news(column).await {
                Ok(items) if !items.is_empty() => {
                    per_country.insert(country.to_string(), items);
                }
                Ok(_) => {}
                Err(e) => {
                    // One empty region feed should not fail the others.
                    log::warn!("Global news feed for {} failed: {}", country, e);
                }
            }
        }

        if per_country.is_empty() {
            return Err(MarketDataError::Parse("all region news feeds empty".to_string()));
        }
        Ok(MarketPayload::GlobalNews(per_country))
    }
}

#[async_trait]
impl MarketDataProvider for EastmoneyProvider {
    fn id(&self) -> &'static str {
        PROVIDER_EASTMONEY
    }

    fn supports(&self, kind: DataKind) -> bool {
        !matches!(kind, DataKind::RealtimeQuotes | DataKind::MarketIndex)
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<MarketPayload, MarketDataError> {
        match request.kind {
            DataKind::IndustryRank => self.fetch_industry_ranking().await,
            DataKind::MoneyFlow => self.fetch_money_flow().await,
            DataKind::News => self.fetch_news().await,
            DataKind::LongShortRank => self.fetch_long_short_ranking().await,
            DataKind::HotTopics => self.fetch_hot_topics().await,
            DataKind::GlobalIndex => self.fetch_global_index_list().await,
            DataKind::GlobalNews => self.fetch_global_news().await,
            DataKind::GlobalSentiment => self.fetch_global_sentiment().await,
            other => Err(MarketDataError::ProviderUnavailable {
                provider: PROVIDER_EASTMONEY.to_string(),
                reason: format!("kind {} not supported", other),
            }),
        }
    }
}

/// `data.diff` rows of a push2 response.
fn diff_rows(body: &Value) -> Result<Vec<Value>, MarketDataError> {
    body.get("data")
        .and_then(|d| d.get("diff"))
        .and_then(|d| d.as_array())
        .cloned()
        .ok_or_else(|| MarketDataError::Parse("missing data.diff in push2 response".to_string()))
}

/// Numeric field that may arrive as a number or as `"-"`.
fn field_decimal(item: &Value, key: &str) -> Decimal {
    match item.get(key) {
        Some(Value::Number(n)) => {
            n.as_f64().and_then(Decimal::from_f64).unwrap_or_default()
        }
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

fn field_string(item: &Value, key: &str) -> Option<String> {
    match item.get(key) {
        Some(Value::String(s)) if !s.is_empty() && s != "-" => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn compute_sentiment(country: &str, changes: &[Decimal]) -> MarketSentiment {
    let advancing = changes.iter().filter(|c| c.is_sign_positive() && !c.is_zero()).count() as u32;
    let declining = changes.iter().filter(|c| c.is_sign_negative()).count() as u32;
    let score = if changes.is_empty() {
        Decimal::ZERO
    } else {
        (changes.iter().sum::<Decimal>() / Decimal::from(changes.len())).round_dp(2)
    };
    let label = if score > dec!(0.3) {
        SentimentLabel::Bullish
    } else if score < dec!(-0.3) {
        SentimentLabel::Bearish
    } else {
        SentimentLabel::Neutral
    };
    MarketSentiment {
        country: country.to_string(),
        advancing,
        declining,
        score,
        label,
    }
}

/// `2024-01-10 15:00:03` in exchange-local time (UTC+8) to UTC.
fn parse_cn_datetime(s: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S").ok()?;
    let offset = FixedOffset::east_opt(8 * 3600)?;
    Some(
        naive
            .and_local_timezone(offset)
            .single()?
            .with_timezone(&Utc),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_rows_extracts_list() {
        let body = json!({"rc": 0, "data": {"diff": [{"f12": "BK0475"}, {"f12": "BK0476"}]}});
        assert_eq!(diff_rows(&body).unwrap().len(), 2);
    }

    #[test]
    fn test_diff_rows_missing_is_parse_error() {
        let body = json!({"rc": 0, "data": null});
        assert!(matches!(diff_rows(&body), Err(MarketDataError::Parse(_))));
    }

    #[test]
    fn test_field_decimal_handles_suspended_marker() {
        let row = json!({"f2": 10.5, "f3": "-"});
        assert_eq!(field_decimal(&row, "f2"), dec!(10.5));
        assert_eq!(field_decimal(&row, "f3"), Decimal::ZERO);
        assert_eq!(field_decimal(&row, "f99"), Decimal::ZERO);
    }

    #[test]
    fn test_field_string_skips_placeholders() {
        let row = json!({"f14": "银行", "f128": "-", "f12": 600000});
        assert_eq!(field_string(&row, "f14").unwrap(), "银行");
        assert!(field_string(&row, "f128").is_none());
        assert_eq!(field_string(&row, "f12").unwrap(), "600000");
    }

    #[test]
    fn test_compute_sentiment_labels() {
        let bullish = compute_sentiment("US", &[dec!(1.2), dec!(0.8), dec!(-0.1)]);
        assert_eq!(bullish.label, SentimentLabel::Bullish);
        assert_eq!(bullish.advancing, 2);
        assert_eq!(bullish.declining, 1);

        let bearish = compute_sentiment("JP", &[dec!(-1.5)]);
        assert_eq!(bearish.label, SentimentLabel::Bearish);

        let neutral = compute_sentiment("HK", &[dec!(0.1), dec!(-0.2)]);
        assert_eq!(neutral.label, SentimentLabel::Neutral);
    }

    #[test]
    fn test_parse_cn_datetime_offset() {
        let ts = parse_cn_datetime("2024-01-10 08:00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-10T00:00:00+00:00");
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_industry_ranking() {
        let provider = EastmoneyProvider::new(None);
        let payload = provider
            .fetch(&FetchRequest::kind(DataKind::IndustryRank))
            .await
            .unwrap();
        assert!(!payload.into_industry_ranking().unwrap().is_empty());
    }
}
