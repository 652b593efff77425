//! Search backend trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::{Result, SearchResult};

/// A single search backend.
///
/// Backends are interchangeable behind this trait; the orchestrator holds an
/// ordered list of them and walks it most-reliable first. Implementations
/// should honor `timeout` for their own network calls; the orchestrator
/// additionally bounds each attempt from the outside.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Returns the backend's display name.
    fn name(&self) -> &str;

    /// Runs one search attempt, returning at most `limit` results.
    async fn attempt(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<SearchResult>>;
}
