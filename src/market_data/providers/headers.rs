//! HTTP client construction for the upstream market data endpoints.

use log::warn;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

use crate::market_data::market_data_constants::REQUEST_TIMEOUT_SECS;
use crate::settings::ProxySettings;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";

/// Create headers for Sina quote API requests
pub fn sina_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        REFERER,
        HeaderValue::from_static("https://finance.sina.com.cn/"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

/// Create headers for Tencent quote API requests
pub fn tencent_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(REFERER, HeaderValue::from_static("https://gu.qq.com/"));
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

/// Create headers for Eastmoney API requests
pub fn eastmoney_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        REFERER,
        HeaderValue::from_static("https://quote.eastmoney.com/"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    headers
}

/// Build a client with the given default headers, the shared timeout and
/// the optional outbound proxy. An unusable proxy URL is skipped with a
/// warning rather than failing client construction.
pub fn build_client(headers: HeaderMap, proxy: Option<&ProxySettings>) -> Client {
    let mut builder = Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));

    if let Some(settings) = proxy {
        match reqwest::Proxy::all(&settings.url) {
            Ok(mut p) => {
                if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
                    p = p.basic_auth(user, pass);
                }
                builder = builder.proxy(p);
            }
            Err(e) => warn!("Ignoring invalid proxy URL '{}': {}", settings.url, e),
        }
    }

    builder.build().expect("Failed to create HTTP client")
}
