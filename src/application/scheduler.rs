//! Forever loop driving the scrape cycles.
//!
//! The seed file is re-read at the top of every cycle so URL additions and
//! removals take effect without a restart. Seed and export failures are
//! fatal: they mean the operator's filesystem contract is broken, unlike a
//! per-URL scrape failure which the batch layer isolates.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::batch::BatchRunner;
use crate::infrastructure::export::ExportWriter;

/// On-disk seed format: `{"products_urls": ["https://...", ...]}`.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub products_urls: Vec<String>,
}

pub struct Scheduler {
    runner: BatchRunner,
    export: ExportWriter,
    seed_path: PathBuf,
    cycle_interval: Duration,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(
        runner: BatchRunner,
        export: ExportWriter,
        seed_path: impl Into<PathBuf>,
        cycle_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            runner,
            export,
            seed_path: seed_path.into(),
            cycle_interval,
            shutdown,
        }
    }

    /// Runs cycles until the shutdown token fires. The in-flight cycle always
    /// completes and exports before the loop exits.
    pub async fn run(&self) -> Result<()> {
        loop {
            let seed = load_seed(&self.seed_path).await?;
            info!(
                urls = seed.products_urls.len(),
                "starting scrape cycle"
            );

            let report = self.runner.run_cycle(&seed.products_urls).await;
            info!(
                products = report.products.len(),
                failures = report.failures.len(),
                "scrape cycle finished"
            );
            self.export.write_cycle(&report).await?;

            select! {
                _ = tokio::time::sleep(self.cycle_interval) => {}
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested, stopping scheduler");
                    return Ok(());
                }
            }
        }
    }
}

pub async fn load_seed(path: &std::path::Path) -> Result<SeedFile> {
    let body = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading seed file {}", path.display()))?;
    serde_json::from_str(&body)
        .with_context(|| format!("parsing seed file {}", path.display()))
}
