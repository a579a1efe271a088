//! End-to-end cycle test over the in-memory repository: scrape, reconcile,
//! export, without any network access.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use pricewatch::application::batch::BatchRunner;
use pricewatch::application::scraper::{ProductScraper, product_code_from_url};
use pricewatch::domain::product::{
    Details, Offer, OffersHistoryEntry, PriceHistoryEntry, ProductSnapshot,
};
use pricewatch::domain::repositories::ProductRepository;
use pricewatch::infrastructure::export::ExportWriter;
use pricewatch::infrastructure::memory_repository::InMemoryProductRepository;
use pricewatch::infrastructure::scrape_error::ScrapeResult;

fn snapshot(code: &str, min_price: f64, max_price: f64) -> ProductSnapshot {
    let now = Utc::now();
    let offers = vec![
        Offer {
            merchant_name: "Alser".to_string(),
            price: min_price,
        },
        Offer {
            merchant_name: "Technodom".to_string(),
            price: max_price,
        },
    ];
    let mut details = Details::new();
    details.insert("Color".to_string(), vec!["black".to_string()]);
    ProductSnapshot {
        product_code: code.to_string(),
        name: format!("Product {code}"),
        min_price,
        max_price,
        rating: 4.8,
        comments_count: 42,
        details,
        image_links: vec!["https://img.example/large.jpg".to_string()],
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
    }
}

/// Serves canned snapshots keyed by product code.
struct CannedScraper;

#[async_trait]
impl ProductScraper for CannedScraper {
    fn product_code(&self, url: &str) -> ScrapeResult<String> {
        product_code_from_url(url)
    }

    async fn scrape(&self, url: &str) -> ScrapeResult<ProductSnapshot> {
        let code = product_code_from_url(url)?;
        // The "200" product is scraped at a new, lower price.
        let snap = match code.as_str() {
            "200" => snapshot("200", 800.0, 1200.0),
            other => snapshot(other, 1000.0, 1500.0),
        };
        Ok(snap)
    }
}

#[tokio::test]
async fn full_cycle_creates_updates_and_exports() {
    let repository = Arc::new(InMemoryProductRepository::new());

    // Product 200 already exists with the old price and the same offer
    // composition the new scrape will report, except for the price change.
    let mut existing = snapshot("200", 900.0, 1200.0);
    existing.offers = snapshot("200", 800.0, 1200.0).offers;
    existing.offers_entry.offers = existing.offers.clone();
    repository.create(&existing).await.unwrap();

    let runner = BatchRunner::new(
        Arc::new(CannedScraper),
        repository.clone(),
        Duration::ZERO,
        4,
    );

    let urls = vec![
        "https://kaspi.kz/shop/p/new-product-100/".to_string(),
        "https://kaspi.kz/shop/p/known-product-200/".to_string(),
    ];
    let report = runner.run_cycle(&urls).await;

    assert!(report.failures.is_empty());
    assert_eq!(report.products.len(), 2);

    // First sight of product 100: single-entry histories.
    let created = repository.get_by_code("100").await.unwrap().unwrap();
    assert_eq!(created.price_history.len(), 1);
    assert_eq!(created.offers_history.len(), 1);
    assert_eq!(created.min_price, 1000.0);

    // Product 200 changed price but not offers: only the price log grew.
    let updated = repository.get_by_code("200").await.unwrap().unwrap();
    assert_eq!(updated.min_price, 800.0);
    assert_eq!(updated.price_history.len(), 2);
    assert_eq!(updated.offers_history.len(), 1);

    let dir = tempfile::tempdir().unwrap();
    ExportWriter::new(dir.path()).write_cycle(&report).await.unwrap();

    let products = std::fs::read_to_string(dir.path().join("products.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&products).unwrap();
    let info = value.get("products_info").unwrap();
    assert!(info.get("https://kaspi.kz/shop/p/new-product-100/").is_some());
    assert!(info.get("https://kaspi.kz/shop/p/known-product-200/").is_some());

    let failures = std::fs::read_to_string(dir.path().join("skipped_urls.json")).unwrap();
    assert_eq!(failures.trim(), "[]");
}

#[tokio::test]
async fn second_cycle_with_freshness_window_touches_nothing() {
    let repository = Arc::new(InMemoryProductRepository::new());
    let runner = BatchRunner::new(
        Arc::new(CannedScraper),
        repository.clone(),
        Duration::from_secs(3600),
        4,
    );

    let urls = vec!["https://kaspi.kz/shop/p/new-product-100/".to_string()];
    runner.run_cycle(&urls).await;
    let first = repository.get_by_code("100").await.unwrap().unwrap();

    let report = runner.run_cycle(&urls).await;
    let second = repository.get_by_code("100").await.unwrap().unwrap();

    assert_eq!(first.updated_at, second.updated_at);
    assert_eq!(report.products.len(), 1);
}
