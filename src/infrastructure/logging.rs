//! Logging initialization.
//!
//! Structured console logging via `tracing`: either one JSON object per line
//! (the default, matching downstream log shipping) or a human-readable
//! format. The filter comes from `RUST_LOG` when set, otherwise from the
//! logging config.

use anyhow::Result;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::infrastructure::config::LoggingConfig;

pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.filter))?;

    if config.json {
        Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init()?;
    } else {
        Registry::default().with(filter).with(fmt::layer()).try_init()?;
    }

    Ok(())
}
