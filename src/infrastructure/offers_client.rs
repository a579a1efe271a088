//! Client for the paginated offers API.
//!
//! Offers arrive 60 per page; the listing is drained until the
//! server-reported total is covered. A page ceiling guards against a server
//! that reports a total its pages never satisfy.

use std::future::Future;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::product::Offer;
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

#[derive(Debug, Clone)]
pub struct OffersClientConfig {
    pub base_url: String,
    pub city_id: String,
    pub zone_id: String,
    /// Fixed request page size; the upstream default is 60.
    pub page_size: u32,
    /// Iteration ceiling for the pagination loop.
    pub max_pages: u32,
}

impl Default for OffersClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://kaspi.kz".to_string(),
            city_id: "750000000".to_string(),
            zone_id: "Magnum_ZONE1".to_string(),
            page_size: 60,
            max_pages: 50,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OffersRequest<'a> {
    city_id: &'a str,
    id: &'a str,
    #[serde(rename = "merchantUID")]
    merchant_uid: Vec<String>,
    limit: u32,
    page: u32,
    product: ProductFilter<'a>,
    sort_option: &'a str,
    high_rating: Option<bool>,
    search_text: Option<&'a str>,
    is_excellent_merchant: bool,
    zone_id: Vec<&'a str>,
    installation_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductFilter<'a> {
    brand: &'a str,
    category_codes: &'a [String],
    base_product_codes: Vec<String>,
    groups: Option<()>,
}

#[derive(Debug, Deserialize)]
struct OffersPage {
    #[serde(default)]
    offers: Vec<OfferEntry>,
    total: i64,
}

#[derive(Debug, Deserialize)]
struct OfferEntry {
    #[serde(rename = "merchantName")]
    merchant_name: String,
    price: f64,
}

/// Drains a paginated offers listing page by page, in request order, without
/// deduplication. Stops once the server-reported total fits in the pages
/// requested so far; errors out once `max_pages` requests did not cover it.
async fn drain_offer_pages<F, Fut>(
    page_size: u32,
    max_pages: u32,
    mut fetch_page: F,
) -> ScrapeResult<Vec<Offer>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ScrapeResult<OffersPage>>,
{
    let mut offers = Vec::new();
    let mut total = 0i64;

    for page in 0..max_pages {
        let page_data = fetch_page(page).await?;
        total = page_data.total;
        offers.extend(page_data.offers.into_iter().map(|entry| Offer {
            merchant_name: entry.merchant_name,
            price: entry.price,
        }));

        // All claimed results are retrieved once the total fits in the pages
        // requested so far.
        if total <= i64::from(page_size) * i64::from(page + 1) {
            debug!(total, pages = page + 1, "offers listing drained");
            return Ok(offers);
        }
    }

    Err(ScrapeError::PaginationExhausted {
        pages: max_pages,
        total,
    })
}

pub struct OffersClient {
    http: Arc<HttpClient>,
    config: OffersClientConfig,
}

impl OffersClient {
    pub fn new(http: Arc<HttpClient>, config: OffersClientConfig) -> Self {
        Self { http, config }
    }

    /// Collects every seller offer for a product, in API order.
    pub async fn fetch_all(
        &self,
        product_code: &str,
        referer: &str,
        brand: &str,
        category_codes: &[String],
    ) -> ScrapeResult<Vec<Offer>> {
        let url = format!(
            "{}/yml/offer-view/offers/{}",
            self.config.base_url, product_code
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer)
                .map_err(|e| ScrapeError::network(referer, format!("invalid referer: {e}")))?,
        );
        headers.insert(
            ORIGIN,
            HeaderValue::from_str(&self.config.base_url).map_err(|e| {
                ScrapeError::network(&self.config.base_url, format!("invalid origin: {e}"))
            })?,
        );

        let url = &url;
        let headers = &headers;
        drain_offer_pages(self.config.page_size, self.config.max_pages, |page| {
            let body = OffersRequest {
                city_id: &self.config.city_id,
                id: product_code,
                merchant_uid: Vec::new(),
                limit: self.config.page_size,
                page,
                product: ProductFilter {
                    brand,
                    category_codes,
                    base_product_codes: Vec::new(),
                    groups: None,
                },
                sort_option: "PRICE",
                high_rating: None,
                search_text: None,
                is_excellent_merchant: false,
                zone_id: vec![&self.config.zone_id],
                installation_id: "-1",
            };
            async move {
                self.http
                    .post_json::<OffersPage, _>(url, &body, headers.clone())
                    .await
            }
        })
        .await
    }
}
