//! Scrape orchestration: one URL in, one fully populated snapshot out.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use tracing::debug;
use url::Url;

use crate::domain::product::{OffersHistoryEntry, PriceHistoryEntry, ProductSnapshot};
use crate::infrastructure::html_extractor;
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::offers_client::OffersClient;
use crate::infrastructure::reviews_client::ReviewsClient;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// Produces one product snapshot for a catalog URL. The batch layer depends
/// on this trait so it can run against test doubles.
#[async_trait]
pub trait ProductScraper: Send + Sync {
    /// Derives the stable product code from a catalog URL without touching
    /// the network.
    fn product_code(&self, url: &str) -> ScrapeResult<String>;

    /// Fetches and assembles the full snapshot. Any sub-step failure fails
    /// the whole scrape; no partial snapshot is ever returned.
    async fn scrape(&self, url: &str) -> ScrapeResult<ProductSnapshot>;
}

/// Site URL convention: the product code is the last hyphen-delimited token
/// of the second-to-last path segment
/// (`https://host/shop/p/some-product-slug-113702116/`).
pub fn product_code_from_url(url: &str) -> ScrapeResult<String> {
    Url::parse(url)
        .map_err(|e| ScrapeError::response_shape(format!("invalid product url '{url}': {e}")))?;

    let mut segments = url.split('/').rev();
    let _last = segments.next();
    let slug = segments
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| {
            ScrapeError::response_shape(format!("cannot derive product code from '{url}'"))
        })?;

    match slug.rsplit('-').next() {
        Some(code) if !code.is_empty() => Ok(code.to_string()),
        _ => Err(ScrapeError::response_shape(format!(
            "cannot derive product code from '{url}'"
        ))),
    }
}

pub struct ScrapeOrchestrator {
    http: Arc<HttpClient>,
    reviews: ReviewsClient,
    offers: OffersClient,
}

impl ScrapeOrchestrator {
    pub fn new(http: Arc<HttpClient>, reviews: ReviewsClient, offers: OffersClient) -> Self {
        Self {
            http,
            reviews,
            offers,
        }
    }
}

#[async_trait]
impl ProductScraper for ScrapeOrchestrator {
    fn product_code(&self, url: &str) -> ScrapeResult<String> {
        product_code_from_url(url)
    }

    async fn scrape(&self, url: &str) -> ScrapeResult<ProductSnapshot> {
        let product_code = self.product_code(url)?;
        debug!(%url, %product_code, "fetching product page");

        let html = self.http.get_text(url, HeaderMap::new()).await?;
        let page = html_extractor::parse_page_data(&html)?;
        let reviews = self.reviews.fetch(&product_code, url).await?;
        let offers = self
            .offers
            .fetch_all(&product_code, url, &page.brand, &page.category_codes)
            .await?;

        // The offers request pins sortOption=PRICE (ascending), so the first
        // and last entries bound the price range.
        let (min_price, max_price) = match (offers.first(), offers.last()) {
            (Some(first), Some(last)) => (first.price, last.price),
            _ => {
                return Err(ScrapeError::response_shape(format!(
                    "offers listing for product {product_code} is empty"
                )));
            }
        };

        let now = Utc::now();
        Ok(ProductSnapshot {
            product_code,
            name: page.title,
            min_price,
            max_price,
            rating: reviews.rating,
            comments_count: reviews.comments,
            details: page.details,
            image_links: page.image_links,
            sellers_count: offers.len() as i64,
            price_entry: PriceHistoryEntry {
                date: now,
                min_price,
                max_price,
            },
            offers_entry: OffersHistoryEntry {
                date: now,
                offers: offers.clone(),
            },
            offers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::trailing_slash("https://kaspi.kz/shop/p/samsung-galaxy-a55-113702116/", "113702116")]
    #[case::with_query(
        "https://kaspi.kz/shop/p/apple-iphone-15-108632867/?c=750000000",
        "108632867"
    )]
    #[case::single_token_slug("https://kaspi.kz/shop/p/9900042/", "9900042")]
    fn derives_product_code(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(product_code_from_url(url).unwrap(), expected);
    }

    #[test]
    fn rejects_invalid_url() {
        assert!(product_code_from_url("not a url").is_err());
    }

    #[test]
    fn rejects_url_without_slug() {
        assert!(product_code_from_url("https://kaspi.kz").is_err());
    }
}
