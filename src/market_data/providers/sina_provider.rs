//! Sina realtime quote endpoint (hq.sinajs.cn) plus the 7x24 live
//! news feed. Quote responses are GBK-encoded `var hq_str_...` lines.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use reqwest::Client;

use crate::market_data::market_data_constants::PROVIDER_SINA;
use crate::market_data::market_data_errors::MarketDataError;
use crate::market_data::market_data_model::{
    DataKind, FetchRequest, MarketIndex, MarketPayload, NewsItem, Quote,
};
use crate::market_data::providers::headers::{build_client, sina_headers};
use crate::market_data::providers::market_data_provider::MarketDataProvider;
use crate::settings::ProxySettings;

const HQ_BASE_URL: &str = "https://hq.sinajs.cn";
const NEWS_FEED_URL: &str = "https://zhibo.sina.com.cn/api/zhibo/feed";
/// 7x24 finance channel of the live feed.
const NEWS_CHANNEL_ID: u32 = 152;
const NEWS_PAGE_SIZE: u32 = 30;

/// Domestic indices served through the same quote endpoint.
const INDEX_CODES: [&str; 6] = [
    "sh000001", "sz399001", "sz399006", "sh000300", "sh000016", "sz399005",
];

pub struct SinaProvider {
    client: Client,
}

#[derive(Deserialize)]
struct FeedResponse {
    result: Option<FeedResult>,
}

#[derive(Deserialize)]
struct FeedResult {
    data: Option<FeedData>,
}

#[derive(Deserialize)]
struct FeedData {
    feed: Option<FeedList>,
}

#[derive(Deserialize)]
struct FeedList {
    list: Option<Vec<FeedItem>>,
}

#[derive(Deserialize)]
struct FeedItem {
    rich_text: Option<String>,
    create_time: Option<String>,
    docurl: Option<String>,
}

impl SinaProvider {
    pub fn new(proxy: Option<&ProxySettings>) -> Self {
        Self {
            client: build_client(sina_headers(), proxy),
        }
    }

    async fn fetch_hq_lines(&self, codes: &[String]) -> Result<String, MarketDataError> {
        let url = format!("{}/list={}", HQ_BASE_URL, codes.join(","));
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MarketDataError::ProviderUnavailable {
                provider: PROVIDER_SINA.to_string(),
                reason: format!("quote request failed: {}", response.status()),
            });
        }

        Ok(response.text_with_charset("gbk").await?)
    }

    async fn fetch_quotes(&self, codes: &[String]) -> Result<MarketPayload, MarketDataError> {
        if codes.is_empty() {
            return Ok(MarketPayload::Quotes(Vec::new()));
        }
        let body = self.fetch_hq_lines(codes).await?;
        let quotes: Vec<Quote> = body
            .lines()
            .filter_map(parse_quote_line)
            .collect();

        if quotes.is_empty() {
            return Err(MarketDataError::Parse(
                "no parseable quote lines in Sina response".to_string(),
            ));
        }
        Ok(MarketPayload::Quotes(quotes))
    }

    async fn fetch_index_list(&self) -> Result<MarketPayload, MarketDataError> {
        let codes: Vec<String> = INDEX_CODES.iter().map(|c| format!("s_{}", c)).collect();
        let body = self.fetch_hq_lines(&codes).await?;
        let indices: Vec<MarketIndex> = body
            .lines()
            .filter_map(parse_index_line)
            .collect();

        if indices.is_empty() {
            return Err(MarketDataError::Parse(
                "no parseable index lines in Sina response".to_string(),
            ));
        }
        Ok(MarketPayload::IndexList(indices))
    }

    async fn fetch_news(&self) -> Result<MarketPayload, MarketDataError> {
        let url = format!(
            "{}?page=1&page_size={}&zhibo_id={}",
            NEWS_FEED_URL, NEWS_PAGE_SIZE, NEWS_CHANNEL_ID
        );
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MarketDataError::ProviderUnavailable {
                provider: PROVIDER_SINA.to_string(),
                reason: format!("news request failed: {}", response.status()),
            });
        }

        let feed: FeedResponse = response.json().await?;
        let items = feed
            .result
            .and_then(|r| r.data)
            .and_then(|d| d.feed)
            .and_then(|f| f.list)
            .unwrap_or_default();

        let news: Vec<NewsItem> = items
            .into_iter()
            .filter_map(|item| {
                let title = item.rich_text?;
                Some(NewsItem {
                    title,
                    source: "sina".to_string(),
                    url: item.docurl,
                    published_at: item
                        .create_time
                        .as_deref()
                        .and_then(parse_cn_datetime)
                        .unwrap_or_else(Utc::now),
                })
            })
            .collect();

        if news.is_empty() {
            return Err(MarketDataError::Parse(
                "empty Sina news feed".to_string(),
            ));
        }
        Ok(MarketPayload::News(news))
    }
}

#[async_trait]
impl MarketDataProvider for SinaProvider {
    fn id(&self) -> &'static str {
        PROVIDER_SINA
    }

    fn supports(&self, kind: DataKind) -> bool {
        matches!(
            kind,
            DataKind::RealtimeQuotes | DataKind::MarketIndex | DataKind::News
        )
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<MarketPayload, MarketDataError> {
        match request.kind {
            DataKind::RealtimeQuotes => self.fetch_quotes(&request.codes).await,
            DataKind::MarketIndex => self.fetch_index_list().await,
            DataKind::News => self.fetch_news().await,
            other => Err(MarketDataError::ProviderUnavailable {
                provider: PROVIDER_SINA.to_string(),
                reason: format!("kind {} not supported", other),
            }),
        }
    }
}

fn parse_decimal(s: &str) -> Decimal {
    s.trim().parse::<Decimal>().unwrap_or_default()
}

/// `2024-01-10` + `15:00:03` in exchange-local time (UTC+8) to UTC.
fn parse_quote_timestamp(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let naive =
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S").ok()?;
    let offset = FixedOffset::east_opt(8 * 3600)?;
    Some(
        naive
            .and_local_timezone(offset)
            .single()?
            .with_timezone(&Utc),
    )
}

/// `2024-01-10 15:00:03` (UTC+8) news timestamps.
fn parse_cn_datetime(s: &str) -> Option<DateTime<Utc>> {
    let mut parts = s.splitn(2, ' ');
    let date = parts.next()?;
    let time = parts.next()?;
    parse_quote_timestamp(date, time)
}

/// One `var hq_str_sh600000="..."` line to a Quote.
fn parse_quote_line(line: &str) -> Option<Quote> {
    let code = line.strip_prefix("var hq_str_")?.split('=').next()?.to_string();
    let body = line.split('"').nth(1)?;
    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() < 32 {
        return None;
    }

    let open = parse_decimal(fields[1]);
    let prev_close = parse_decimal(fields[2]);
    let last = parse_decimal(fields[3]);
    let change = last - prev_close;
    let change_percent = if prev_close.is_zero() {
        Decimal::ZERO
    } else {
        (change / prev_close * dec!(100)).round_dp(2)
    };

    Some(Quote {
        code,
        name: fields[0].to_string(),
        last,
        change,
        change_percent,
        open,
        high: parse_decimal(fields[4]),
        low: parse_decimal(fields[5]),
        prev_close,
        volume: parse_decimal(fields[8]),
        turnover: parse_decimal(fields[9]),
        timestamp: parse_quote_timestamp(fields[30], fields[31]).unwrap_or_else(Utc::now),
    })
}

/// One `var hq_str_s_sh000001="..."` compact index line.
fn parse_index_line(line: &str) -> Option<MarketIndex> {
    let code = line
        .strip_prefix("var hq_str_s_")?
        .split('=')
        .next()?
        .to_string();
    let body = line.split('"').nth(1)?;
    let fields: Vec<&str> = body.split(',').collect();
    if fields.len() < 4 {
        return None;
    }

    Some(MarketIndex {
        code,
        name: fields[0].to_string(),
        current: parse_decimal(fields[1]),
        change: parse_decimal(fields[2]),
        change_percent: parse_decimal(fields[3]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTE_LINE: &str = "var hq_str_sh600000=\"浦发银行,10.40,10.38,10.50,10.66,10.30,10.50,10.51,68422524,721636838.00,254400,10.50,159400,10.49,144900,10.48,101100,10.47,86800,10.46,104200,10.51,66200,10.52,83500,10.53,54900,10.54,51900,10.55,2024-01-10,15:00:00,00\";";

    #[test]
    fn test_parse_quote_line() {
        let quote = parse_quote_line(QUOTE_LINE).unwrap();
        assert_eq!(quote.code, "sh600000");
        assert_eq!(quote.name, "浦发银行");
        assert_eq!(quote.last, dec!(10.50));
        assert_eq!(quote.prev_close, dec!(10.38));
        assert_eq!(quote.change, dec!(0.12));
        assert_eq!(quote.change_percent, dec!(1.16));
        assert_eq!(quote.volume, dec!(68422524));
    }

    #[test]
    fn test_parse_quote_line_rejects_garbage() {
        assert!(parse_quote_line("var hq_str_sh600000=\"\";").is_none());
        assert!(parse_quote_line("FATAL: not a quote").is_none());
    }

    #[test]
    fn test_parse_index_line() {
        let line = "var hq_str_s_sh000001=\"上证指数,3231.4089,-12.3655,-0.38,2546195,33786423\";";
        let index = parse_index_line(line).unwrap();
        assert_eq!(index.code, "sh000001");
        assert_eq!(index.current, dec!(3231.4089));
        assert_eq!(index.change_percent, dec!(-0.38));
    }

    #[test]
    fn test_quote_timestamp_is_exchange_local() {
        let ts = parse_quote_timestamp("2024-01-10", "15:00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-10T07:00:00+00:00");
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_quote_fetch() {
        let provider = SinaProvider::new(None);
        let request = FetchRequest::quotes(&["sh600000".to_string()]);
        let payload = provider.fetch(&request).await.unwrap();
        let quotes = payload.into_quotes().unwrap();
        assert_eq!(quotes[0].code, "sh600000");
    }
}
