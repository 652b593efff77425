//! Bing search backend.
//!
//! The baseline backend: first in priority order and the cheapest to hit,
//! but its results always get corroborated against another engine unless
//! they score very highly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::persona::Persona;
use crate::{Result, SearchEngine, SearchError, SearchResult};

/// Bing web search, scraped over plain HTTPS.
pub struct Bing {
    client: Client,
}

impl Bing {
    /// Creates a new Bing backend.
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .gzip(true)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    fn parse_results(&self, html: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let document = Html::parse_document(html);
        let item_selector = Selector::parse("li.b_algo")
            .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {e:?}")))?;
        let title_selector = Selector::parse("h2 a")
            .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {e:?}")))?;
        let snippet_selector = Selector::parse(".b_caption p, p.b_algoSlug")
            .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {e:?}")))?;

        let mut results = Vec::new();
        for item in document.select(&item_selector) {
            let Some(link) = item.select(&title_selector).next() else {
                continue;
            };
            let title = link.text().collect::<String>().trim().to_string();
            let url = link.value().attr("href").unwrap_or_default().to_string();
            if url.is_empty() || title.is_empty() || !url.starts_with("http") {
                continue;
            }

            let description = item
                .select(&snippet_selector)
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            results.push(SearchResult::new(title, url, description));
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }
}

impl Default for Bing {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchEngine for Bing {
    fn name(&self) -> &str {
        "Bing"
    }

    async fn attempt(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<SearchResult>> {
        let persona = Persona::random();
        let url = format!(
            "https://www.bing.com/search?q={}&count={}",
            urlencoding::encode(query),
            limit.clamp(1, 50)
        );

        let response = self
            .client
            .get(&url)
            .headers(persona.headers())
            .timeout(timeout)
            .send()
            .await?;
        let html = response.text().await?;

        self.parse_results(&html, limit)
    }
}
