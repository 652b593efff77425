//! Error types for search and extraction.

use thiserror::Error;

/// Result type alias for search and extraction operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search or content extraction.
#[derive(Error, Debug)]
pub enum SearchError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse a response or document.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Operation exceeded its deadline.
    #[error("Request timed out")]
    Timeout,

    /// Upstream refused the request (403, 429, 503 and friends).
    #[error("Access denied (HTTP {0})")]
    Denied(u16),

    /// The page does not exist.
    #[error("Page not found (HTTP 404)")]
    NotFound,

    /// Any other non-success HTTP status.
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// Response body exceeded the hard size ceiling.
    #[error("Content too large ({0} bytes)")]
    TooLarge(usize),

    /// Extracted text was blank, too short, or carried challenge markers.
    #[error("Extracted content below quality threshold")]
    LowQuality,

    /// Browser launch, navigation, or CDP command failed.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Durable monthly quota is exhausted; the call was not attempted.
    #[error("Monthly quota exhausted, resets in {days_remaining} day(s)")]
    QuotaExceeded {
        /// Days until the month rolls over and the counter resets.
        days_remaining: i64,
    },

    /// No search backends configured.
    #[error("No search backends configured")]
    NoEngines,

    /// Invalid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// URL parsing error.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Filesystem error (quota persistence, profile directories).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl SearchError {
    /// Short, classified message for per-URL failure records.
    ///
    /// Bulk extraction attaches these to failed results instead of raw
    /// error chains.
    pub fn classified_message(&self) -> String {
        match self {
            SearchError::Timeout => "Request timed out".to_string(),
            SearchError::Denied(status) => format!("Access denied (HTTP {status})"),
            SearchError::NotFound => "Page not found (HTTP 404)".to_string(),
            SearchError::TooLarge(_) => "Content too large".to_string(),
            SearchError::LowQuality => "No readable content".to_string(),
            other => format!("Network error: {other}"),
        }
    }
}
