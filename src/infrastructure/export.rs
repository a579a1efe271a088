//! Per-cycle JSON artifact writer.
//!
//! Each cycle produces three files in the export directory: the per-URL
//! product summaries, the per-URL offers/offers-history payloads, and the
//! list of failed URLs with their error text.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::application::batch::{CycleReport, ProductSummary};

pub struct ExportWriter {
    dir: PathBuf,
}

impl ExportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn write_cycle(&self, report: &CycleReport) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating export directory {}", self.dir.display()))?;

        #[derive(Serialize)]
        struct ProductsArtifact<'a> {
            products_info: &'a BTreeMap<String, ProductSummary>,
        }

        self.write_json(
            "products.json",
            &ProductsArtifact {
                products_info: &report.products,
            },
        )
        .await?;
        self.write_json("offers.json", &report.offers).await?;
        self.write_json("skipped_urls.json", &report.failures).await?;

        info!(dir = %self.dir.display(), "cycle artifacts exported");
        Ok(())
    }

    async fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let body = serde_json::to_vec_pretty(value)
            .with_context(|| format!("serializing {name}"))?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
