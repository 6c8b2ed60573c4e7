use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which upstream produced a fundamentals record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundamentalsSource {
    Tushare,
    Akshare,
}

impl FundamentalsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundamentalsSource::Tushare => "TUSHARE",
            FundamentalsSource::Akshare => "AKSHARE",
        }
    }
}

impl std::fmt::Display for FundamentalsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One company's latest financial-statement snapshot.
///
/// Fields are optional because the two providers cover different
/// subsets; a record always carries the provider that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundamentalsRecord {
    pub code: String,
    /// Report period the statement figures refer to, e.g. "20240331".
    pub report_period: String,
    pub revenue: Option<Decimal>,
    pub revenue_yoy: Option<Decimal>,
    pub net_profit: Option<Decimal>,
    pub net_profit_yoy: Option<Decimal>,
    pub eps: Option<Decimal>,
    pub roe: Option<Decimal>,
    pub debt_ratio: Option<Decimal>,
    pub pe: Option<Decimal>,
    pub pb: Option<Decimal>,
    pub source: FundamentalsSource,
    pub fetched_at: DateTime<Utc>,
}

impl FundamentalsRecord {
    pub fn empty(code: &str, source: FundamentalsSource) -> Self {
        Self {
            code: code.to_string(),
            report_period: String::new(),
            revenue: None,
            revenue_yoy: None,
            net_profit: None,
            net_profit_yoy: None,
            eps: None,
            roe: None,
            debt_ratio: None,
            pe: None,
            pb: None,
            source,
            fetched_at: Utc::now(),
        }
    }
}
