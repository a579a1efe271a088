//! Configuration infrastructure.
//!
//! Settings are layered: compiled-in defaults, then an optional
//! `pricewatch.toml` next to the working directory, then `PRICEWATCH_*`
//! environment overrides (nested keys separated by `__`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub runner: RunnerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Settings for the scraping target and HTTP behavior.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub base_url: String,
    /// City selector sent as the `X-Ks-City` header and in offer requests.
    pub city_id: String,
    pub zone_id: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub offer_page_size: u32,
    pub max_offer_pages: u32,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: "https://kaspi.kz".to_string(),
            city_id: "750000000".to_string(),
            zone_id: "Magnum_ZONE1".to_string(),
            user_agent: "pricewatch/0.1".to_string(),
            timeout_seconds: 30,
            max_requests_per_second: 5,
            offer_page_size: 60,
            max_offer_pages: 50,
        }
    }
}

/// Settings for cycle orchestration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Records updated more recently than this are reported from storage
    /// without any network traffic.
    pub freshness_minutes: u64,
    pub max_concurrent_pipelines: usize,
    pub cycle_interval_minutes: u64,
    pub seed_path: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            freshness_minutes: 30,
            max_concurrent_pipelines: 10,
            cycle_interval_minutes: 30,
            seed_path: PathBuf::from("seed.json"),
            export_dir: PathBuf::from("export"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/pricewatch.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. `info` or `pricewatch=debug,info`.
    pub filter: String,
    /// Emit one JSON object per log line.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: true,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("pricewatch").required(false))
            .add_source(config::Environment::with_prefix("PRICEWATCH").separator("__"))
            .build()
            .context("building configuration")?;

        settings
            .try_deserialize()
            .context("deserializing configuration")
    }
}

impl RunnerConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_minutes * 60)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_minutes * 60)
    }
}
