//! Scrape serving errors.

use thiserror::Error;

/// Result type alias for rendering a scrape response.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Failure to turn a snapshot into a scrape response.
///
/// Should not happen while the store invariants hold; the HTTP layer
/// answers with a server error instead of crashing if it does.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to format exposition: {0}")]
    Format(#[from] std::fmt::Error),
}
