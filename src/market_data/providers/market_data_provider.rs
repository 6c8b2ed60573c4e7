use async_trait::async_trait;

use crate::market_data::market_data_errors::MarketDataError;
use crate::market_data::market_data_model::{DataKind, FetchRequest, MarketPayload};

/// One upstream data source. Adapters perform exactly one network call
/// per `fetch`; caching, rate limiting and failover live above them.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn id(&self) -> &'static str;

    fn supports(&self, kind: DataKind) -> bool;

    async fn fetch(&self, request: &FetchRequest) -> Result<MarketPayload, MarketDataError>;
}
