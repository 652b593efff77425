//! DuckDuckGo search backend.
//!
//! Uses the HTML-only endpoint, which serves server-rendered results and
//! wraps outbound URLs in a redirect that must be unwrapped.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::persona::Persona;
use crate::{Result, SearchEngine, SearchError, SearchResult};

/// DuckDuckGo web search against `html.duckduckgo.com`.
pub struct DuckDuckGo {
    client: Client,
}

impl DuckDuckGo {
    /// Creates a new DuckDuckGo backend.
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
        let item_selector = Selector::parse("div.result")
            .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {e:?}")))?;
        let link_selector = Selector::parse("a.result__a")
            .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {e:?}")))?;
        let snippet_selector = Selector::parse(".result__snippet")
            .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {e:?}")))?;

        let results = document
            .select(&item_selector)
            .filter_map(|item| {
                let link = item.select(&link_selector).next()?;
                let title = link.text().collect::<String>().trim().to_string();
                let href = link.value().attr("href")?;
                let url = resolve_redirect(href)?;
                if title.is_empty() {
                    return None;
                }

                let description = item
                    .select(&snippet_selector)
                    .next()
                    .map(|e| e.text().collect::<String>().trim().to_string())
                    .unwrap_or_default();

                Some(SearchResult::new(title, url, description))
            })
            .take(limit)
            .collect();

        Ok(results)
    }
}

impl Default for DuckDuckGo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchEngine for DuckDuckGo {
    fn name(&self) -> &str {
        "DuckDuckGo"
    }

    async fn attempt(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<SearchResult>> {
        let persona = Persona::random();
        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query)
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

/// Unwraps DuckDuckGo's `/l/?uddg=` redirect, passing direct links through.
fn resolve_redirect(href: &str) -> Option<String> {
    if !href.contains("duckduckgo.com/l/") {
        return Some(href.to_string()).filter(|u| !u.is_empty());
    }

    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duckduckgo_name() {
        assert_eq!(DuckDuckGo::new().name(), "DuckDuckGo");
    }

    #[test]
    fn test_resolve_redirect_unwraps_uddg() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&rut=abc";
        assert_eq!(
            resolve_redirect(href),
            Some("https://example.com/page".to_string())
        );
    }

    #[test]
    fn test_resolve_redirect_passes_direct_links() {
        assert_eq!(
            resolve_redirect("https://example.com/direct"),
            Some("https://example.com/direct".to_string())
        );
    }

    #[test]
    fn test_resolve_redirect_rejects_empty() {
        assert_eq!(resolve_redirect(""), None);
    }

    #[test]
    fn test_parse_results_empty_html() {
        let engine = DuckDuckGo::new();
        let results = engine
            .parse_results("<html><body></body></html>", 10)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_parse_results_extracts_fields() {
        let engine = DuckDuckGo::new();
        let html = r#"
            <html><body>
                <div class="result">
                    <a class="result__a" href="https://example.com/a">Alpha</a>
                    <a class="result__snippet">Alpha snippet</a>
                </div>
                <div class="result">
                    <a class="result__a"
                       href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fb">Beta</a>
                    <a class="result__snippet">Beta snippet</a>
                </div>
            </body></html>
        "#;
        let results = engine.parse_results(html, 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://example.com/a");
        assert_eq!(results[1].url, "https://example.com/b");
        assert_eq!(results[1].title, "Beta");
        assert_eq!(results[1].description, "Beta snippet");
    }

    #[test]
    fn test_parse_results_respects_limit() {
        let engine = DuckDuckGo::new();
        let items: String = (0..5)
            .map(|i| {
                format!(
                    r#"<div class="result"><a class="result__a" href="https://example.com/{i}">R{i}</a></div>"#
                )
            })
            .collect();
        let html = format!("<html><body>{items}</body></html>");
        assert_eq!(engine.parse_results(&html, 3).unwrap().len(), 3);
    }
}
