//! Search result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of characters kept in `content_preview`.
const PREVIEW_CHARS: usize = 300;

/// Outcome of fetching a result's full content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// Full content was fetched and extracted.
    #[default]
    Success,
    /// Content fetch failed; see the `error` field.
    Error,
}

/// A single search result, optionally enriched with extracted page content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title.
    pub title: String,
    /// Result URL. Never empty.
    pub url: String,
    /// Result snippet/description from the search engine.
    pub description: String,
    /// Full extracted page text. Empty until extraction runs, and always
    /// empty when `fetch_status` is `Error`.
    pub full_content: String,
    /// Leading slice of `full_content` for compact display.
    pub content_preview: String,
    /// Whitespace-token count of `full_content`.
    pub word_count: usize,
    /// When this record was created or last updated.
    pub timestamp: DateTime<Utc>,
    /// Whether content extraction succeeded.
    pub fetch_status: FetchStatus,
    /// Classified failure message when `fetch_status` is `Error`.
    pub error: Option<String>,
}

impl SearchResult {
    /// Creates a new result from engine output. `url` must be non-empty.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let url = url.into();
        debug_assert!(!url.is_empty(), "SearchResult url must be non-empty");
        Self {
            title: title.into(),
            url,
            description: description.into(),
            full_content: String::new(),
            content_preview: String::new(),
            word_count: 0,
            timestamp: Utc::now(),
            fetch_status: FetchStatus::Success,
            error: None,
        }
    }

    /// Attaches extracted full content, deriving the preview and word count.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.full_content = content.into();
        self.content_preview = self.full_content.chars().take(PREVIEW_CHARS).collect();
        self.word_count = self.full_content.split_whitespace().count();
        self.fetch_status = FetchStatus::Success;
        self.error = None;
        self.timestamp = Utc::now();
        self
    }

    /// Marks the result as a failed fetch with a classified message.
    ///
    /// Clears any content so the `fetch_status == Error` ⇒ empty
    /// `full_content` invariant holds.
    pub fn with_fetch_error(mut self, message: impl Into<String>) -> Self {
        self.full_content = String::new();
        self.content_preview = String::new();
        self.word_count = 0;
        self.fetch_status = FetchStatus::Error;
        self.error = Some(message.into());
        self.timestamp = Utc::now();
        self
    }
}
