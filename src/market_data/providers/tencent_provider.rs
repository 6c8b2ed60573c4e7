//! Tencent realtime quote endpoint (qt.gtimg.cn). Same `v_<code>="..."`
//! line shape as Sina but `~`-delimited, with change/percent precomputed.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use reqwest::Client;

use crate::market_data::market_data_constants::PROVIDER_TENCENT;
use crate::market_data::market_data_errors::MarketDataError;
use crate::market_data::market_data_model::{
    DataKind, FetchRequest, MarketIndex, MarketPayload, Quote,
};
use crate::market_data::providers::headers::{build_client, tencent_headers};
use crate::market_data::providers::market_data_provider::MarketDataProvider;
use crate::settings::ProxySettings;

const QT_BASE_URL: &str = "https://qt.gtimg.cn";

const INDEX_CODES: [&str; 6] = [
    "sh000001", "sz399001", "sz399006", "sh000300", "sh000016", "sz399005",
];

/// Lots of 100 shares; Tencent reports volume in lots.
const SHARES_PER_LOT: Decimal = dec!(100);
/// Turnover arrives in units of 10,000 CNY.
const TURNOVER_UNIT: Decimal = dec!(10000);

pub struct TencentProvider {
    client: Client,
}

impl TencentProvider {
    pub fn new(proxy: Option<&ProxySettings>) -> Self {
        Self {
            client: build_client(tencent_headers(), proxy),
        }
    }

    async fn fetch_lines(&self, query: &str) -> Result<String, MarketDataError> {
        let url = format!("{}/q={}", QT_BASE_URL, query);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(MarketDataError::ProviderUnavailable {
                provider: PROVIDER_TENCENT.to_string(),
                reason: format!("quote request failed: {}", response.status()),
            });
        }

        Ok(response.text_with_charset("gbk").await?)
    }

    async fn fetch_quotes(&self, codes: &[String]) -> Result<MarketPayload, MarketDataError> {
        if codes.is_empty() {
            return Ok(MarketPayload::Quotes(Vec::new()));
        }
        let body = self.fetch_lines(&codes.join(",")).await?;
        let quotes: Vec<Quote> = body.lines().filter_map(parse_quote_line).collect();

        if quotes.is_empty() {
            return Err(MarketDataError::Parse(
                "no parseable quote lines in Tencent response".to_string(),
            ));
        }
        Ok(MarketPayload::Quotes(quotes))
    }

    async fn fetch_index_list(&self) -> Result<MarketPayload, MarketDataError> {
        let query: Vec<String> = INDEX_CODES.iter().map(|c| format!("s_{}", c)).collect();
        let body = self.fetch_lines(&query.join(",")).await?;
        let indices: Vec<MarketIndex> = body.lines().filter_map(parse_index_line).collect();

        if indices.is_empty() {
            return Err(MarketDataError::Parse(
                "no parseable index lines in Tencent response".to_string(),
            ));
        }
        Ok(MarketPayload::IndexList(indices))
    }
}

#[async_trait]
impl MarketDataProvider for TencentProvider {
    fn id(&self) -> &'static str {
        PROVIDER_TENCENT
    }

    fn supports(&self, kind: DataKind) -> bool {
        matches!(kind, DataKind::RealtimeQuotes | DataKind::MarketIndex)
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<MarketPayload, MarketDataError> {
        match request.kind {
            DataKind::RealtimeQuotes => self.fetch_quotes(&request.codes).await,
            DataKind::MarketIndex => self.fetch_index_list().await,
            other => Err(MarketDataError::ProviderUnavailable {
                provider: PROVIDER_TENCENT.to_string(),
                reason: format!("kind {} not supported", other),
            }),
        }
    }
}

fn parse_decimal(s: &str) -> Decimal {
    s.trim().parse::<Decimal>().unwrap_or_default()
}

/// `20240110150003` in exchange-local time (UTC+8) to UTC.
fn parse_compact_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y%m%d%H%M%S").ok()?;
    let offset = FixedOffset::east_opt(8 * 3600)?;
    Some(
        naive
            .and_local_timezone(offset)
            .single()?
            .with_timezone(&Utc),
    )
}

/// One `v_sh600000="1~浦发银行~600000~..."` line to a Quote.
fn parse_quote_line(line: &str) -> Option<Quote> {
    let prefix = line.strip_prefix("v_")?;
    if prefix.starts_with("s_") {
        return None;
    }
    let code = prefix.split('=').next()?.to_string();
    let body = line.split('"').nth(1)?;
    let fields: Vec<&str> = body.split('~').collect();
    if fields.len() < 38 {
        return None;
    }

    Some(Quote {
        code,
        name: fields[1].to_string(),
        last: parse_decimal(fields[3]),
        change: parse_decimal(fields[31]),
        change_percent: parse_decimal(fields[32]),
        open: parse_decimal(fields[5]),
        high: parse_decimal(fields[33]),
        low: parse_decimal(fields[34]),
        prev_close: parse_decimal(fields[4]),
        volume: parse_decimal(fields[36]) * SHARES_PER_LOT,
        turnover: parse_decimal(fields[37]) * TURNOVER_UNIT,
        timestamp: parse_compact_timestamp(fields[30]).unwrap_or_else(Utc::now),
    })
}

/// One `v_s_sh000001="1~上证指数~000001~3231.41~-12.37~-0.38~..."` line.
fn parse_index_line(line: &str) -> Option<MarketIndex> {
    let code = line.strip_prefix("v_s_")?.split('=').next()?.to_string();
    let body = line.split('"').nth(1)?;
    let fields: Vec<&str> = body.split('~').collect();
    if fields.len() < 6 {
        return None;
    }

    Some(MarketIndex {
        code,
        name: fields[1].to_string(),
        current: parse_decimal(fields[3]),
        change: parse_decimal(fields[4]),
        change_percent: parse_decimal(fields[5]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quote_line() -> String {
        let mut fields = vec!["0".to_string(); 40];
        fields[1] = "浦发银行".to_string();
        fields[2] = "600000".to_string();
        fields[3] = "10.50".to_string();
        fields[4] = "10.38".to_string();
        fields[5] = "10.40".to_string();
        fields[30] = "20240110150000".to_string();
        fields[31] = "0.12".to_string();
        fields[32] = "1.16".to_string();
        fields[33] = "10.66".to_string();
        fields[34] = "10.30".to_string();
        fields[36] = "684225".to_string();
        fields[37] = "72163".to_string();
        format!("v_sh600000=\"{}\";", fields.join("~"))
    }

    #[test]
    fn test_parse_quote_line() {
        let quote = parse_quote_line(&sample_quote_line()).unwrap();
        assert_eq!(quote.code, "sh600000");
        assert_eq!(quote.name, "浦发银行");
        assert_eq!(quote.last, dec!(10.50));
        assert_eq!(quote.change_percent, dec!(1.16));
        assert_eq!(quote.volume, dec!(68422500));
        assert_eq!(quote.turnover, dec!(721630000));
    }

    #[test]
    fn test_parse_index_line() {
        let line = "v_s_sh000001=\"1~上证指数~000001~3231.41~-12.37~-0.38~2546195~33786423~~~ZS\";";
        let index = parse_index_line(line).unwrap();
        assert_eq!(index.code, "sh000001");
        assert_eq!(index.name, "上证指数");
        assert_eq!(index.change, dec!(-12.37));
    }

    #[test]
    fn test_index_lines_are_not_quotes() {
        let line = "v_s_sh000001=\"1~上证指数~000001~3231.41~-12.37~-0.38~2546195~33786423~~~ZS\";";
        assert!(parse_quote_line(line).is_none());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_index_fetch() {
        let provider = TencentProvider::new(None);
        let payload = provider
            .fetch(&FetchRequest::kind(DataKind::MarketIndex))
            .await
            .unwrap();
        assert!(!payload.into_index_list().unwrap().is_empty());
    }
}
