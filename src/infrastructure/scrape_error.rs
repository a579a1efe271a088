//! Error taxonomy for the scrape pipeline.
//!
//! Every variant is fatal for the URL being processed in the current cycle;
//! the batch layer records it and retries naturally on the next scheduled
//! cycle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The embedded product data object is missing or malformed.
    #[error("embedded product data extraction failed: {0}")]
    Extraction(String),

    /// Transport failure or non-success status.
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    /// The upstream API answered, but not in the shape we rely on.
    #[error("unexpected response shape: {context}")]
    ResponseShape { context: String },

    /// The offers listing never satisfied its own reported total within the
    /// configured page ceiling.
    #[error("offer pagination did not terminate after {pages} pages (server reported total {total})")]
    PaginationExhausted { pages: u32, total: i64 },
}

impl ScrapeError {
    pub fn network(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn response_shape(context: impl Into<String>) -> Self {
        Self::ResponseShape {
            context: context.into(),
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
