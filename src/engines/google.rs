//! Google search backend, rendered through the shared browser pool.
//!
//! Google's result page needs JavaScript and is quick to serve CAPTCHAs to
//! plain HTTP clients, so this backend opens a pooled persona session,
//! waits for the result container, and parses the rendered markup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::browser::{BrowserPool, Session};
use crate::persona::Persona;
use crate::{Result, SearchEngine, SearchError, SearchResult};

/// Grace period for the result container to render.
const RESULTS_WAIT: Duration = Duration::from_secs(3);

/// Google web search via a rendered browser session.
pub struct GoogleBrowser {
    pool: Arc<BrowserPool>,
}

impl GoogleBrowser {
    /// Creates a Google backend over the shared pool.
    pub fn new(pool: Arc<BrowserPool>) -> Self {
        Self { pool }
    }

    async fn run(
        &self,
        session: &Session,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<SearchResult>> {
        let page = session.page();
        let url = format!(
            "https://www.google.com/search?q={}&num={}&hl=en",
            urlencoding::encode(query),
            limit.clamp(1, 20)
        );

        match tokio::time::timeout(timeout, page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(SearchError::Browser(format!("Navigation failed: {e}"))),
            Err(_) => return Err(SearchError::Timeout),
        }

        // Results render asynchronously; a miss here is not fatal, the
        // CAPTCHA check below reports the real cause.
        let _ = tokio::time::timeout(RESULTS_WAIT, page.find_element("div#search")).await;

        let html = page
            .content()
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to read result page: {e}")))?;

        if html.contains("/sorry/index") || html.contains("recaptcha") {
            return Err(SearchError::Other(
                "Google served a CAPTCHA interstitial (bot detected)".to_string(),
            ));
        }

        parse_results(&html, limit)
    }
}

#[async_trait]
impl SearchEngine for GoogleBrowser {
    fn name(&self) -> &str {
        "Google"
    }

    async fn attempt(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<SearchResult>> {
        let session = self.pool.session(Persona::random()).await?;
        let outcome = self.run(&session, query, limit, timeout).await;
        session.close().await;
        outcome
    }
}

fn parse_results(html: &str, limit: usize) -> Result<Vec<SearchResult>> {
    let document = Html::parse_document(html);
    let container_selector = Selector::parse("div.g, div.MjjYud")
        .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {e:?}")))?;
    let title_selector = Selector::parse("h3")
        .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {e:?}")))?;
    let link_selector = Selector::parse("a[href]")
        .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {e:?}")))?;
    let snippet_selector = Selector::parse("div[data-sncf], div.VwiC3b")
        .map_err(|e| SearchError::Parse(format!("Failed to parse selector: {e:?}")))?;

    let mut results: Vec<SearchResult> = Vec::new();
    for container in document.select(&container_selector) {
        let Some(title) = container
            .select(&title_selector)
            .next()
            .map(|e| e.text().collect::<String>().trim().to_string())
        else {
            continue;
        };
        let Some(url) = container
            .select(&link_selector)
            .next()
            .and_then(|e| e.value().attr("href"))
            .and_then(clean_result_url)
        else {
            continue;
        };
        if title.is_empty() {
            continue;
        }
        // The two container classes can nest; keep the first sighting.
        if results.iter().any(|r| r.url == url) {
            continue;
        }

        let description = container
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

/// Normalizes a result link: unwrap `/url?q=` redirects, drop internal ones.
fn clean_result_url(href: &str) -> Option<String> {
    if let Some(rest) = href.strip_prefix("/url?q=") {
        let target = rest.split('&').next().unwrap_or(rest);
        return urlencoding::decode(target)
            .map(|u| u.into_owned())
            .ok()
            .filter(|u| u.starts_with("http"));
    }
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_result_url_direct() {
        assert_eq!(
            clean_result_url("https://example.com/page"),
            Some("https://example.com/page".to_string())
        );
    }

    #[test]
    fn test_clean_result_url_redirect() {
        assert_eq!(
            clean_result_url("/url?q=https%3A%2F%2Fexample.com%2Fpage&sa=U"),
            Some("https://example.com/page".to_string())
        );
    }

    #[test]
    fn test_clean_result_url_internal() {
        assert_eq!(clean_result_url("/search?q=more"), None);
        assert_eq!(clean_result_url("#fragment"), None);
    }

    #[test]
    fn test_parse_results_empty_html() {
        let results = parse_results("<html><body></body></html>", 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_parse_results_extracts_fields() {
        let html = r#"
            <html><body><div id="search">
                <div class="g">
                    <a href="https://example.com/one"><h3>First</h3></a>
                    <div class="VwiC3b">First snippet</div>
                </div>
                <div class="g">
                    <a href="/url?q=https%3A%2F%2Fexample.com%2Ftwo&sa=U"><h3>Second</h3></a>
                    <div class="VwiC3b">Second snippet</div>
                </div>
            </div></body></html>
        "#;
        let results = parse_results(html, 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "First");
        assert_eq!(results[0].url, "https://example.com/one");
        assert_eq!(results[1].url, "https://example.com/two");
        assert_eq!(results[1].description, "Second snippet");
    }

    #[test]
    fn test_parse_results_deduplicates_nested_containers() {
        let html = r#"
            <html><body>
                <div class="MjjYud"><div class="g">
                    <a href="https://example.com/one"><h3>Only once</h3></a>
                </div></div>
            </body></html>
        "#;
        let results = parse_results(html, 10).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_parse_results_respects_limit() {
        let items: String = (0..5)
            .map(|i| {
                format!(
                    r#"<div class="g"><a href="https://example.com/{i}"><h3>R{i}</h3></a></div>"#
                )
            })
            .collect();
        let html = format!("<html><body>{items}</body></html>");
        assert_eq!(parse_results(&html, 3).unwrap().len(), 3);
    }
}
