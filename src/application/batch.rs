//! Batch execution of per-URL pipelines for one cycle.
//!
//! Every catalog URL runs `freshness check → scrape → reconcile → persist`
//! in its own task, gated by a counting semaphore. A URL failure is recorded
//! and isolated; it never aborts the batch and is retried naturally on the
//! next scheduled cycle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::application::reconciler::{DiffReconciler, ReconcileOutcome};
use crate::application::scraper::ProductScraper;
use crate::domain::product::{Details, Offer, OffersHistoryEntry, PriceHistoryEntry, ProductRecord};
use crate::domain::repositories::ProductRepository;

/// Per-URL product summary exported after each cycle: the persisted record
/// without its internal identifier, timestamps and offer payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub product_code: String,
    pub name: String,
    pub min_price: f64,
    pub max_price: f64,
    pub rating: f64,
    pub comments_count: i64,
    pub details: Details,
    pub image_links: Vec<String>,
    pub sellers_count: i64,
    pub price_history: Vec<PriceHistoryEntry>,
}

impl From<&ProductRecord> for ProductSummary {
    fn from(record: &ProductRecord) -> Self {
        Self {
            product_code: record.product_code.clone(),
            name: record.name.clone(),
            min_price: record.min_price,
            max_price: record.max_price,
            rating: record.rating,
            comments_count: record.comments_count,
            details: record.details.clone(),
            image_links: record.image_links.clone(),
            sellers_count: record.sellers_count,
            price_history: record.price_history.clone(),
        }
    }
}

/// Per-URL offers payload exported after each cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlOffers {
    pub offers: Vec<Offer>,
    pub offers_history: Vec<OffersHistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedUrl {
    pub url: String,
    pub error: String,
}

/// Aggregated result of one cycle, handed to the export writer.
#[derive(Debug, Default, Serialize)]
pub struct CycleReport {
    pub products: BTreeMap<String, ProductSummary>,
    pub offers: BTreeMap<String, UrlOffers>,
    pub failures: Vec<FailedUrl>,
}

struct UrlOutcome {
    summary: ProductSummary,
    offers: UrlOffers,
}

pub struct BatchRunner {
    scraper: Arc<dyn ProductScraper>,
    repository: Arc<dyn ProductRepository>,
    reconciler: DiffReconciler,
    freshness_window: TimeDelta,
    max_concurrent: usize,
}

impl BatchRunner {
    pub fn new(
        scraper: Arc<dyn ProductScraper>,
        repository: Arc<dyn ProductRepository>,
        freshness_window: Duration,
        max_concurrent: usize,
    ) -> Self {
        let reconciler = DiffReconciler::new(Arc::clone(&repository));
        Self {
            scraper,
            repository,
            reconciler,
            freshness_window: TimeDelta::from_std(freshness_window).unwrap_or(TimeDelta::MAX),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Runs every URL through the pipeline under the concurrency cap and
    /// aggregates the cycle report. Completion order across URLs is
    /// unconstrained; the report is keyed by URL, so nothing depends on it.
    pub async fn run_cycle(&self, urls: &[String]) -> CycleReport {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = Vec::with_capacity(urls.len());

        for url in urls {
            let url = url.clone();
            let semaphore = Arc::clone(&semaphore);
            let scraper = Arc::clone(&self.scraper);
            let repository = Arc::clone(&self.repository);
            let reconciler = self.reconciler.clone();
            let freshness_window = self.freshness_window;

            tasks.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(anyhow!("admission gate closed")),
                };
                process_url(&url, scraper, repository, reconciler, freshness_window).await
            }));
        }

        let results = futures::future::join_all(tasks).await;

        let mut report = CycleReport::default();
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok(Ok(outcome)) => {
                    report.products.insert(url.clone(), outcome.summary);
                    report.offers.insert(url.clone(), outcome.offers);
                }
                Ok(Err(e)) => {
                    let error = format!("{e:#}");
                    error!(%url, %error, "product pipeline failed");
                    report.failures.push(FailedUrl {
                        url: url.clone(),
                        error,
                    });
                }
                Err(join_error) => {
                    error!(%url, "product pipeline task aborted: {join_error}");
                    report.failures.push(FailedUrl {
                        url: url.clone(),
                        error: format!("pipeline task aborted: {join_error}"),
                    });
                }
            }
        }

        report
    }
}

async fn process_url(
    url: &str,
    scraper: Arc<dyn ProductScraper>,
    repository: Arc<dyn ProductRepository>,
    reconciler: DiffReconciler,
    freshness_window: TimeDelta,
) -> Result<UrlOutcome> {
    info!(%url, "processing catalog url");

    let product_code = scraper.product_code(url)?;
    let stored = repository.get_by_code(&product_code).await?;

    // Recently reconciled records are reported verbatim from storage,
    // without a single network request.
    if let Some(record) = &stored {
        let age = Utc::now().signed_duration_since(record.updated_at);
        if age < freshness_window {
            info!(%product_code, "record is fresh, skipping scrape");
            return Ok(UrlOutcome {
                summary: ProductSummary::from(record),
                offers: UrlOffers {
                    offers: record.offers.clone(),
                    offers_history: record.offers_history.clone(),
                },
            });
        }
    }

    let snapshot = scraper
        .scrape(url)
        .await
        .with_context(|| format!("scraping {url}"))?;
    let (record, outcome) = reconciler.reconcile(stored, &snapshot).await?;

    match outcome {
        ReconcileOutcome::Created => info!(%product_code, "product record created"),
        ReconcileOutcome::Updated => info!(%product_code, "product record updated"),
        ReconcileOutcome::Unchanged => info!(%product_code, "product record unchanged"),
    }

    Ok(UrlOutcome {
        summary: ProductSummary::from(&record),
        offers: UrlOffers {
            offers: record.offers,
            offers_history: record.offers_history,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::scraper::product_code_from_url;
    use crate::domain::product::ProductSnapshot;
    use crate::infrastructure::memory_repository::InMemoryProductRepository;
    use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn snapshot_for(code: &str, price: f64) -> ProductSnapshot {
        let now = Utc::now();
        let offers = vec![Offer {
            merchant_name: "Shop".to_string(),
            price,
        }];
        ProductSnapshot {
            product_code: code.to_string(),
            name: format!("Product {code}"),
            min_price: price,
            max_price: price,
            rating: 4.0,
            comments_count: 1,
            details: Details::new(),
            image_links: vec!["https://img.example/1.jpg".to_string()],
            sellers_count: offers.len() as i64,
            price_entry: PriceHistoryEntry {
                date: now,
                min_price: price,
                max_price: price,
            },
            offers_entry: OffersHistoryEntry {
                date: now,
                offers: offers.clone(),
            },
            offers,
        }
    }

    /// Scraper double that tracks in-flight concurrency and call counts.
    struct FakeScraper {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        scrapes: AtomicUsize,
        fail_codes: Vec<String>,
    }

    impl FakeScraper {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                scrapes: AtomicUsize::new(0),
                fail_codes: Vec::new(),
            }
        }

        fn failing_on(codes: &[&str]) -> Self {
            Self {
                fail_codes: codes.iter().map(|c| c.to_string()).collect(),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl ProductScraper for FakeScraper {
        fn product_code(&self, url: &str) -> ScrapeResult<String> {
            product_code_from_url(url)
        }

        async fn scrape(&self, url: &str) -> ScrapeResult<ProductSnapshot> {
            self.scrapes.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let code = product_code_from_url(url)?;
            if self.fail_codes.contains(&code) {
                return Err(ScrapeError::network(url, "status 502"));
            }
            Ok(snapshot_for(&code, 1000.0))
        }
    }

    fn urls(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("https://kaspi.kz/shop/p/item-{i}/"))
            .collect()
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_the_cap() {
        let scraper = Arc::new(FakeScraper::new());
        let repository = Arc::new(InMemoryProductRepository::new());
        let runner = BatchRunner::new(
            scraper.clone(),
            repository,
            Duration::from_secs(600),
            5,
        );

        let report = runner.run_cycle(&urls(50)).await;

        assert!(report.failures.is_empty());
        assert_eq!(report.products.len(), 50);
        assert!(scraper.peak.load(Ordering::SeqCst) <= 5);
        assert_eq!(scraper.scrapes.load(Ordering::SeqCst), 50);
    }

    #[tokio::test]
    async fn fresh_records_skip_the_network_entirely() {
        let scraper = Arc::new(FakeScraper::new());
        let repository = Arc::new(InMemoryProductRepository::new());

        // Pre-populate a record that was just reconciled.
        repository.create(&snapshot_for("item-0", 777.0)).await.unwrap();

        let runner = BatchRunner::new(
            scraper.clone(),
            repository,
            Duration::from_secs(600),
            5,
        );
        let report = runner.run_cycle(&urls(1)).await;

        assert_eq!(scraper.scrapes.load(Ordering::SeqCst), 0);
        let summary = report.products.get("https://kaspi.kz/shop/p/item-0/").unwrap();
        assert_eq!(summary.min_price, 777.0);
        assert_eq!(summary.price_history.len(), 1);
    }

    #[tokio::test]
    async fn a_failed_url_does_not_abort_the_batch() {
        let scraper = Arc::new(FakeScraper::failing_on(&["item-1"]));
        let repository = Arc::new(InMemoryProductRepository::new());
        let runner = BatchRunner::new(
            scraper,
            repository,
            Duration::ZERO,
            5,
        );

        let report = runner.run_cycle(&urls(3)).await;

        assert_eq!(report.products.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].url, "https://kaspi.kz/shop/p/item-1/");
        assert!(report.failures[0].error.contains("status 502"));
    }

    #[tokio::test]
    async fn stale_records_are_rescraped_and_reconciled() {
        let scraper = Arc::new(FakeScraper::new());
        let repository = Arc::new(InMemoryProductRepository::new());
        repository.create(&snapshot_for("item-0", 500.0)).await.unwrap();

        // Zero freshness window forces a scrape even for just-written records.
        let runner = BatchRunner::new(scraper.clone(), repository.clone(), Duration::ZERO, 5);
        let report = runner.run_cycle(&urls(1)).await;

        assert_eq!(scraper.scrapes.load(Ordering::SeqCst), 1);
        let summary = report.products.get("https://kaspi.kz/shop/p/item-0/").unwrap();
        assert_eq!(summary.min_price, 1000.0);
        // Price changed, so the history grew by exactly one entry.
        assert_eq!(summary.price_history.len(), 2);

        let record = repository.get_by_code("item-0").await.unwrap().unwrap();
        assert_eq!(record.price_history.len(), 2);
        assert_eq!(record.offers_history.len(), 2);
    }
}
