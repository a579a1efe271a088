use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use pricewatch::application::batch::BatchRunner;
use pricewatch::application::scheduler::Scheduler;
use pricewatch::application::scraper::ScrapeOrchestrator;
use pricewatch::infrastructure::config::AppConfig;
use pricewatch::infrastructure::export::ExportWriter;
use pricewatch::infrastructure::http_client::{HttpClient, HttpClientConfig};
use pricewatch::infrastructure::logging;
use pricewatch::infrastructure::offers_client::{OffersClient, OffersClientConfig};
use pricewatch::infrastructure::reviews_client::ReviewsClient;
use pricewatch::infrastructure::sqlite_repository::SqliteProductRepository;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init(&config.logging)?;
    info!(base_url = %config.scraper.base_url, "starting pricewatch");

    let http = Arc::new(HttpClient::new(&HttpClientConfig {
        user_agent: config.scraper.user_agent.clone(),
        timeout_seconds: config.scraper.timeout_seconds,
        max_requests_per_second: config.scraper.max_requests_per_second,
        default_headers: vec![("X-Ks-City".to_string(), config.scraper.city_id.clone())],
    })?);

    let reviews = ReviewsClient::new(Arc::clone(&http), config.scraper.base_url.clone());
    let offers = OffersClient::new(
        Arc::clone(&http),
        OffersClientConfig {
            base_url: config.scraper.base_url.clone(),
            city_id: config.scraper.city_id.clone(),
            zone_id: config.scraper.zone_id.clone(),
            page_size: config.scraper.offer_page_size,
            max_pages: config.scraper.max_offer_pages,
        },
    );
    let scraper = Arc::new(ScrapeOrchestrator::new(http, reviews, offers));

    let repository = Arc::new(
        SqliteProductRepository::connect(&config.storage.database_url)
            .await
            .context("connecting to product database")?,
    );

    let runner = BatchRunner::new(
        scraper,
        repository,
        config.runner.freshness_window(),
        config.runner.max_concurrent_pipelines,
    );
    let export = ExportWriter::new(config.runner.export_dir.clone());

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received, finishing current cycle"),
            Err(e) => error!("failed to listen for shutdown signal: {e}"),
        }
        signal_token.cancel();
    });

    let scheduler = Scheduler::new(
        runner,
        export,
        config.runner.seed_path.clone(),
        config.runner.cycle_interval(),
        shutdown,
    );
    scheduler.run().await
}
