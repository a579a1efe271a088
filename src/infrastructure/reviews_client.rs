//! Client for the reviews API (aggregate rating and comment count).

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde::Deserialize;

use crate::domain::product::Reviews;
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

#[derive(Debug, Deserialize)]
struct ReviewsResponse {
    summary: ReviewSummary,
    #[serde(rename = "groupSummary", default)]
    group_summary: Vec<GroupSummary>,
}

#[derive(Debug, Deserialize)]
struct ReviewSummary {
    global: f64,
}

#[derive(Debug, Deserialize)]
struct GroupSummary {
    total: i64,
}

pub struct ReviewsClient {
    http: Arc<HttpClient>,
    base_url: String,
}

impl ReviewsClient {
    pub fn new(http: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// One GET against the reviews endpoint. The product page URL travels as
    /// the Referer header.
    pub async fn fetch(&self, product_code: &str, referer: &str) -> ScrapeResult<Reviews> {
        let url = format!(
            "{}/yml/review-view/api/v1/reviews/product/{}?baseProductCode&orderCode&filter=COMMENT&sort=POPULARITY&limit=9&merchantCodes&withAgg=true",
            self.base_url, product_code
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer)
                .map_err(|e| ScrapeError::network(referer, format!("invalid referer: {e}")))?,
        );

        let response: ReviewsResponse = self.http.get_json(&url, headers).await?;

        // Index 1 of the grouped summary is the COMMENT bucket. Structural
        // assumption of the upstream API, not configurable.
        let comments = response
            .group_summary
            .get(1)
            .map(|group| group.total)
            .ok_or_else(|| {
                ScrapeError::response_shape("groupSummary has no entry at index 1".to_string())
            })?;

        Ok(Reviews {
            rating: response.summary.global,
            comments,
        })
    }
}
