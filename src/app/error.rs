use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeedwatchError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Listing source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Failed to parse listing page: {0}")]
    ParseFailure(String),

    #[error("Page {page} did not load within {after:?}")]
    PageTimeout { page: u32, after: Duration },

    #[error("Detail resolution timed out after {0:?}")]
    ResolutionTimeout(Duration),

    #[error("Detail resolution failed: {0}")]
    ResolutionFailure(String),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("A reconciliation pass is already running")]
    PassInProgress,

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Scraper error: {0}")]
    Scraper(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl SeedwatchError {
    /// Errors that only affect one page or listing and should not end a pass.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SeedwatchError::Http(_)
                | SeedwatchError::SourceUnavailable(_)
                | SeedwatchError::ParseFailure(_)
                | SeedwatchError::PageTimeout { .. }
                | SeedwatchError::ResolutionTimeout(_)
                | SeedwatchError::ResolutionFailure(_)
                | SeedwatchError::Scraper(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SeedwatchError>;
