//! Pricewatch - periodic product scrape-and-reconcile daemon
//!
//! Scrapes marketplace product pages on a schedule, reconciles each fresh
//! snapshot against the stored record with field-level diffs, and exports
//! per-cycle JSON artifacts.

pub mod application;
pub mod domain;
pub mod infrastructure;
