//! Tushare Pro client (token-gated JSON-RPC style POST API).
//!
//! Every call ships the token in the request body; the token itself is
//! owned by the service layer so configuration changes apply to the
//! next call without rebuilding the client.

use chrono::Utc;
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::fundamentals::errors::FundamentalsError;
use crate::fundamentals::models::{FundamentalsRecord, FundamentalsSource};
use crate::market_data::providers::headers::build_client;
use crate::settings::ProxySettings;

const TUSHARE_API_URL: &str = "https://api.tushare.pro";

const PROVIDER: &str = "TUSHARE";

pub struct TushareClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct TushareRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: Value,
    fields: &'a str,
}

#[derive(Deserialize)]
struct TushareResponse {
    code: i64,
    msg: Option<String>,
    data: Option<TushareData>,
}

/// Columnar result set: field names plus rows of values.
#[derive(Debug, Deserialize)]
pub(crate) struct TushareData {
    pub(crate) fields: Vec<String>,
    pub(crate) items: Vec<Vec<Value>>,
}

impl TushareData {
    fn column(&self, row: &[Value], name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|f| f == name)?;
        row.get(idx).cloned()
    }
}

impl TushareClient {
    pub fn new(proxy: Option<&ProxySettings>) -> Self {
        Self {
            client: build_client(reqwest::header::HeaderMap::new(), proxy),
            base_url: TUSHARE_API_URL.to_string(),
        }
    }

    async fn call(
        &self,
        token: &str,
        api_name: &str,
        params: Value,
        fields: &str,
    ) -> Result<TushareData, FundamentalsError> {
        let request = TushareRequest {
            api_name,
            token,
            params,
            fields,
        };
        let response = self.client.post(&self.base_url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(FundamentalsError::ProviderUnavailable {
                provider: PROVIDER.to_string(),
                reason: format!("{} request failed: {}", api_name, response.status()),
            });
        }

        let body: TushareResponse = response.json().await?;
        if body.code != 0 {
            return Err(FundamentalsError::ProviderUnavailable {
                provider: PROVIDER.to_string(),
                reason: body
                    .msg
                    .unwrap_or_else(|| format!("{} returned code {}", api_name, body.code)),
            });
        }
        body.data
            .ok_or_else(|| FundamentalsError::Parse(format!("{} response without data", api_name)))
    }

    /// Latest financial indicators and valuation multiples for one code.
    pub async fn get_fundamentals(
        &self,
        token: &str,
        code: &str,
    ) -> Result<FundamentalsRecord, FundamentalsError> {
        if token.is_empty() {
            return Err(FundamentalsError::TokenMissing);
        }
        let ts_code = to_ts_code(code)?;

        let indicators = self
            .call(
                token,
                "fina_indicator",
                json!({ "ts_code": ts_code }),
                "end_date,eps,roe,or_yoy,netprofit_yoy,debt_to_assets",
            )
            .await?;
        let valuation = self
            .call(
                token,
                "daily_basic",
                json!({ "ts_code": ts_code }),
                "trade_date,pe,pb",
            )
            .await?;

        if indicators.items.is_empty() && valuation.items.is_empty() {
            return Err(FundamentalsError::NoData(code.to_string()));
        }
        Ok(build_record(code, &indicators, &valuation))
    }
}

/// `sh600000` -> `600000.SH`, the symbol form tushare expects.
fn to_ts_code(code: &str) -> Result<String, FundamentalsError> {
    let normalized = crate::market_data::market_data_model::normalize_stock_code(code);
    let (prefix, digits) = normalized.split_at(normalized.len().min(2));
    let suffix = match prefix {
        "sh" => "SH",
        "sz" => "SZ",
        "bj" => "BJ",
        _ => return Err(FundamentalsError::InvalidCode(code.to_string())),
    };
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(FundamentalsError::InvalidCode(code.to_string()));
    }
    Ok(format!("{}.{}", digits, suffix))
}

fn value_decimal(value: Option<Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => Decimal::from_f64(n.as_f64()?),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn value_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Rows arrive most-recent first; the head of each result set is the
/// latest report period / trade date.
fn build_record(code: &str, indicators: &TushareData, valuation: &TushareData) -> FundamentalsRecord {
    let mut record = FundamentalsRecord::empty(code, FundamentalsSource::Tushare);
    record.fetched_at = Utc::now();

    if let Some(row) = indicators.items.first() {
        record.report_period = value_string(indicators.column(row, "end_date")).unwrap_or_default();
        record.eps = value_decimal(indicators.column(row, "eps"));
        record.roe = value_decimal(indicators.column(row, "roe"));
        record.revenue_yoy = value_decimal(indicators.column(row, "or_yoy"));
        record.net_profit_yoy = value_decimal(indicators.column(row, "netprofit_yoy"));
        record.debt_ratio = value_decimal(indicators.column(row, "debt_to_assets"));
    }
    if let Some(row) = valuation.items.first() {
        record.pe = value_decimal(valuation.column(row, "pe"));
        record.pb = value_decimal(valuation.column(row, "pb"));
    }
    record
}
