//! Brave Search API backend.
//!
//! The free API tier allows one request per second and 2000 per month, so
//! every call goes through the durable [`QuotaLimiter`], whose monthly
//! counter survives restarts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::limiter::QuotaLimiter;
use crate::{Result, SearchEngine, SearchError, SearchResult};

const API_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";

/// Environment variable holding the subscription token.
pub const BRAVE_API_KEY_ENV: &str = "BRAVE_SEARCH_API_KEY";

/// Brave Search JSON API backend.
pub struct BraveApi {
    api_key: String,
    client: Client,
    quota: QuotaLimiter,
}

impl BraveApi {
    /// Creates a backend with the default free-tier quota limits.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_quota(api_key, QuotaLimiter::for_brave_api())
    }

    /// Creates a backend with an explicit quota limiter.
    pub fn with_quota(api_key: impl Into<String>, quota: QuotaLimiter) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::builder()
                .gzip(true)
                .build()
                .expect("Failed to create HTTP client"),
            quota,
        }
    }

    /// Builds the backend from `BRAVE_SEARCH_API_KEY`, if set.
    pub fn from_env() -> Option<Self> {
        match std::env::var(BRAVE_API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Some(Self::new(key)),
            _ => {
                debug!("{BRAVE_API_KEY_ENV} not set, Brave API backend disabled");
                None
            }
        }
    }
}

#[async_trait]
impl SearchEngine for BraveApi {
    fn name(&self) -> &str {
        "Brave"
    }

    async fn attempt(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<SearchResult>> {
        let count = limit.clamp(1, 20).to_string();
        self.quota
            .execute(|| async {
                let response = self
                    .client
                    .get(API_ENDPOINT)
                    .query(&[("q", query), ("count", count.as_str())])
                    .header("X-Subscription-Token", &self.api_key)
                    .header("Accept", "application/json")
                    .timeout(timeout)
                    .send()
                    .await?;

                let status = response.status().as_u16();
                if !(200..300).contains(&status) {
                    return Err(match status {
                        403 | 429 => SearchError::Denied(status),
                        other => SearchError::Status(other),
                    });
                }

                let payload: Value = response.json().await?;
                Ok(parse_payload(&payload, limit))
            })
            .await
    }
}

/// Pulls `web.results[].{title,url,description}` out of an API response.
fn parse_payload(payload: &Value, limit: usize) -> Vec<SearchResult> {
    payload
        .pointer("/web/results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let title = item.get("title")?.as_str()?.to_string();
                    let url = item.get("url")?.as_str()?.to_string();
                    if url.is_empty() || title.is_empty() {
                        return None;
                    }
                    let description = item
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    Some(SearchResult::new(title, url, description))
                })
                .take(limit)
                .collect()
        })
        .unwrap_or_default()
}
