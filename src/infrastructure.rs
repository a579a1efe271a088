//! Infrastructure layer for configuration, HTTP access, parsing, storage
//! and export.

pub mod config;
pub mod export;
pub mod html_extractor;
pub mod http_client;
pub mod logging;
pub mod memory_repository;
pub mod offers_client;
pub mod reviews_client;
pub mod scrape_error;
pub mod sqlite_repository;
