//! Application layer
//!
//! Orchestrates scraping, reconciliation and batch execution on top of the
//! domain model and the infrastructure clients.

pub mod batch;
pub mod reconciler;
pub mod scheduler;
pub mod scraper;
