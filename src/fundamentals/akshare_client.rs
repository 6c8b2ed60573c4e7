//! AKShare client, reached through a local AKTools REST bridge.
//!
//! The community provider is free and token-less; figures arrive as
//! display strings with Chinese unit suffixes (`459.06亿`, `3.41%`)
//! and are normalized here.

use chrono::Utc;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::fundamentals::errors::FundamentalsError;
use crate::fundamentals::models::{FundamentalsRecord, FundamentalsSource};
use crate::market_data::market_data_model::normalize_stock_code;
use crate::market_data::providers::headers::build_client;
use crate::settings::ProxySettings;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

const PROVIDER: &str = "AKSHARE";

pub struct AkshareClient {
    client: Client,
    base_url: String,
}

impl AkshareClient {
    pub fn new(proxy: Option<&ProxySettings>) -> Self {
        Self {
            client: build_client(reqwest::header::HeaderMap::new(), proxy),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at a non-default AKTools endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_rows(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<Value>, FundamentalsError> {
        let url = format!("{}/api/public/{}", self.base_url, endpoint);
        let response = self.client.get(&url).query(params).send().await?;

        if !response.status().is_success() {
            return Err(FundamentalsError::ProviderUnavailable {
                provider: PROVIDER.to_string(),
                reason: format!("{} request failed: {}", endpoint, response.status()),
            });
        }

        let body: Value = response.json().await?;
        body.as_array()
            .cloned()
            .ok_or_else(|| FundamentalsError::Parse(format!("{} response is not a list", endpoint)))
    }

    /// Latest statement abstract and valuation multiples for one code.
    pub async fn get_fundamentals(
        &self,
        code: &str,
    ) -> Result<FundamentalsRecord, FundamentalsError> {
        let normalized = normalize_stock_code(code);
        let symbol = bare_symbol(&normalized)?;

        let abstract_rows = self
            .get_rows(
                "stock_financial_abstract_ths",
                &[("symbol", symbol), ("indicator", "按报告期")],
            )
            .await?;
        let valuation_rows = self
            .get_rows("stock_a_indicator_lg", &[("symbol", symbol)])
            .await?;

        if abstract_rows.is_empty() && valuation_rows.is_empty() {
            return Err(FundamentalsError::NoData(code.to_string()));
        }
        Ok(build_record(&normalized, &abstract_rows, &valuation_rows))
    }
}

/// `sh600000` -> `600000`, the bare symbol AKTools expects.
fn bare_symbol(normalized: &str) -> Result<&str, FundamentalsError> {
    let digits = normalized
        .strip_prefix("sh")
        .or_else(|| normalized.strip_prefix("sz"))
        .or_else(|| normalized.strip_prefix("bj"))
        .unwrap_or(normalized);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(FundamentalsError::InvalidCode(normalized.to_string()));
    }
    Ok(digits)
}

/// `459.06亿` / `1.2万` / `3.41%` / `0.52` to a plain Decimal.
fn parse_cn_number(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed == "--" {
        return None;
    }
    if let Some(stripped) = trimmed.strip_suffix('%') {
        return stripped.trim().parse().ok();
    }
    if let Some(stripped) = trimmed.strip_suffix('亿') {
        return stripped
            .trim()
            .parse::<Decimal>()
            .ok()
            .map(|v| v * dec!(100000000));
    }
    if let Some(stripped) = trimmed.strip_suffix('万') {
        return stripped
            .trim()
            .parse::<Decimal>()
            .ok()
            .map(|v| v * dec!(10000));
    }
    trimmed.parse().ok()
}

fn row_number(row: &Value, key: &str) -> Option<Decimal> {
    match row.get(key)? {
        Value::String(s) => parse_cn_number(s),
        Value::Number(n) => Decimal::from_f64(n.as_f64()?),
        _ => None,
    }
}

fn row_string(row: &Value, key: &str) -> Option<String> {
    row.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Abstract rows arrive most-recent first, valuation rows oldest first.
fn build_record(code: &str, abstract_rows: &[Value], valuation_rows: &[Value]) -> FundamentalsRecord {
    let mut record = FundamentalsRecord::empty(code, FundamentalsSource::Akshare);
    record.fetched_at = Utc::now();

    if let Some(row) = abstract_rows.first() {
        record.report_period = row_string(row, "报告期").unwrap_or_default();
        record.revenue = row_number(row, "营业总收入");
        record.revenue_yoy = row_number(row, "营业总收入同比增长率");
        record.net_profit = row_number(row, "净利润");
        record.net_profit_yoy = row_number(row, "净利润同比增长率");
        record.eps = row_number(row, "基本每股收益");
        record.roe = row_number(row, "净资产收益率");
        record.debt_ratio = row_number(row, "资产负债率");
    }
    if let Some(row) = valuation_rows.last() {
        record.pe = row_number(row, "pe");
        record.pb = row_number(row, "pb");
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_symbol() {
        assert_eq!(bare_symbol("sh600000").unwrap(), "600000");
        assert_eq!(bare_symbol("sz000001").unwrap(), "000001");
        assert!(bare_symbol("shABCDEF").is_err());
    }

    #[test]
    fn test_parse_cn_number_units() {
        assert_eq!(parse_cn_number("459.06亿").unwrap(), dec!(45906000000));
        assert_eq!(parse_cn_number("1.2万").unwrap(), dec!(12000));
        assert_eq!(parse_cn_number("3.41%").unwrap(), dec!(3.41));
        assert_eq!(parse_cn_number("-2.10%").unwrap(), dec!(-2.10));
        assert_eq!(parse_cn_number("0.52").unwrap(), dec!(0.52));
        assert!(parse_cn_number("--").is_none());
        assert!(parse_cn_number("").is_none());
    }

    #[test]
    fn test_build_record_from_rows() {
        let abstract_rows = vec![json!({
            "报告期": "2024-03-31",
            "营业总收入": "459.06亿",
            "营业总收入同比增长率": "3.41%",
            "净利润": "174.21亿",
            "净利润同比增长率": "-2.10%",
            "基本每股收益": "0.52",
            "净资产收益率": "2.41%",
            "资产负债率": "91.20%"
        })];
        let valuation_rows = vec![
            json!({"trade_date": "2024-01-09", "pe": 5.0, "pb": 0.46}),
            json!({"trade_date": "2024-01-10", "pe": 4.9, "pb": 0.45}),
        ];

        let record = build_record("sh600000", &abstract_rows, &valuation_rows);
        assert_eq!(record.report_period, "2024-03-31");
        assert_eq!(record.revenue.unwrap(), dec!(45906000000));
        assert_eq!(record.net_profit_yoy.unwrap(), dec!(-2.10));
        assert_eq!(record.eps.unwrap(), dec!(0.52));
        // Valuation comes from the most recent trade date.
        assert_eq!(record.pe.unwrap(), dec!(4.9));
        assert_eq!(record.source, FundamentalsSource::Akshare);
    }

    #[test]
    fn test_build_record_with_no_valuation() {
        let record = build_record("sh600000", &[], &[]);
        assert!(record.pe.is_none());
        assert!(record.report_period.is_empty());
    }
}
