pub mod eastmoney_provider;
pub mod headers;
pub mod market_data_provider;
pub mod sina_provider;
pub mod tencent_provider;

pub use eastmoney_provider::EastmoneyProvider;
pub use market_data_provider::MarketDataProvider;
pub use sina_provider::SinaProvider;
pub use tencent_provider::TencentProvider;
