//! HTTP client for scraping with rate limiting and error handling.
//!
//! The client configuration is immutable after construction; request-specific
//! headers (Referer, Origin) are passed per call so concurrent pipelines never
//! share mutable header state.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// HTTP client configuration for scraping.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    /// Headers attached to every request (e.g. the city selector header).
    pub default_headers: Vec<(String, String)>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "pricewatch/0.1".to_string(),
            timeout_seconds: 30,
            max_requests_per_second: 5,
            default_headers: Vec::new(),
        }
    }
}

/// Rate-limited HTTP client shared by all pipelines.
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("invalid user agent")?,
        );
        for (name, value) in &config.default_headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())
                    .with_context(|| format!("invalid header name '{name}'"))?,
                HeaderValue::from_str(value)
                    .with_context(|| format!("invalid value for header '{name}'"))?,
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .context("failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("rate limit must be greater than 0")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    /// Fetch a URL and return the body as text.
    pub async fn get_text(&self, url: &str, headers: HeaderMap) -> ScrapeResult<String> {
        let response = self.get(url, headers).await?;
        response
            .text()
            .await
            .map_err(|e| ScrapeError::network(url, format!("failed to read body: {e}")))
    }

    /// Fetch a URL and decode the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> ScrapeResult<T> {
        let response = self.get(url, headers).await?;
        response.json::<T>().await.map_err(|e| {
            ScrapeError::response_shape(format!("decoding response from {url}: {e}"))
        })
    }

    /// POST a JSON body and decode the JSON response into `T`.
    pub async fn post_json<T, B>(&self, url: &str, body: &B, headers: HeaderMap) -> ScrapeResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.rate_limiter.until_ready().await;
        debug!(%url, "issuing POST request");

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| ScrapeError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::network(url, format!("status {status}")));
        }

        response.json::<T>().await.map_err(|e| {
            ScrapeError::response_shape(format!("decoding response from {url}: {e}"))
        })
    }

    async fn get(&self, url: &str, headers: HeaderMap) -> ScrapeResult<reqwest::Response> {
        self.rate_limiter.until_ready().await;
        debug!(%url, "issuing GET request");

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| ScrapeError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::network(url, format!("status {status}")));
        }

        Ok(response)
    }
}
