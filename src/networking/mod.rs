use std::time::Duration;

use chrono::Utc;
use log::warn;
use reqwest::header::{CACHE_CONTROL, EXPIRES, HeaderMap, HeaderValue, PRAGMA};
use reqwest::{Client, Url};

use crate::config::NetworkConfig;

const USER_AGENT: &str = concat!("rayban-assistant/", env!("CARGO_PKG_VERSION"));
const CACHE_BUST_PARAM: &str = "t";

/// Shared HTTP client for the manifest and artifact endpoints.
#[derive(Clone, Debug)]
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client }
    }

    pub fn from_config(config: &NetworkConfig) -> Self {
        Self::new(config.connect_timeout(), config.read_timeout())
    }

    pub fn http(&self) -> &Client {
        &self.client
    }
}

/// Append a unique `t=<millis>-<nonce>` query parameter so CDN and proxy
/// caches never serve a stale copy. Existing query parameters are kept.
pub fn cache_busted(url: &Url) -> Url {
    let stamp = Utc::now().timestamp_millis();
    let nonce: u32 = rand::random();
    let mut busted = url.clone();
    busted
        .query_pairs_mut()
        .append_pair(CACHE_BUST_PARAM, &format!("{stamp}-{nonce:08x}"));
    busted
}

/// Request headers that disable intermediary and client-side caching.
pub fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    headers
}
