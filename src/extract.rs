//! Two-tier content extraction.
//!
//! The lightweight tier is a plain HTTP fetch with persona headers and a
//! DOM-reduction pass. When that fails in a way that smells like bot
//! defenses (blocked statuses, challenge markers, JS-heavy hosts), the
//! pipeline escalates to a rendered fetch through the shared browser pool.
//! The escalation policy is an ordered, inspectable rule table rather than
//! a pile of inline conditions.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::browser::{BrowserPool, Session};
use crate::persona::Persona;
use crate::result::{FetchStatus, SearchResult};
use crate::{Result, SearchError};

/// Content containers tried in priority order before falling back to the
/// whole document.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    r#"[role="main"]"#,
    ".content",
    "#main-content",
    "#content",
];

/// Elements that never contribute readable text.
const STRIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "svg", "canvas", "img", "picture",
    "video", "audio", "source", "track", "form", "button", "input", "select", "nav", "header",
    "footer", "aside",
];

/// Class/id tokens that mark boilerplate regions.
const NOISE_TOKENS: &[&str] = &[
    "ad",
    "ads",
    "advert",
    "advertisement",
    "sidebar",
    "banner",
    "cookie",
    "popup",
    "promo",
    "newsletter",
];

/// Phrases that indicate a challenge page rather than content.
const CHALLENGE_MARKERS: &[&str] = &[
    "enable javascript",
    "captcha",
    "unusual traffic",
    "are you a robot",
    "robot check",
    "verify you are human",
    "checking your browser",
    "access denied",
    "attention required",
];

/// Extracted text shorter than this is considered a failed extraction.
const LOW_QUALITY_CHARS: usize = 100;

/// Hosts that serve empty shells without JavaScript; the lightweight tier
/// is pointless for them.
const JS_HEAVY_HOSTS: &[&str] = &[
    "twitter.com",
    "x.com",
    "instagram.com",
    "facebook.com",
    "linkedin.com",
    "reddit.com",
    "medium.com",
    "bloomberg.com",
    "threads.net",
];

/// Configuration for the extraction pipeline.
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Default cap on extracted text length (characters).
    pub max_length: usize,
    /// Default per-URL extraction timeout.
    pub timeout: Duration,
    /// Minimum text length for a content container to be accepted.
    pub min_container_chars: usize,
    /// Hard ceiling on raw response bodies; larger bodies abort extraction.
    pub max_body_bytes: usize,
    /// How long the rendered tier waits for a content selector to appear.
    pub selector_wait: Duration,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_length: 8000,
            timeout: Duration::from_secs(15),
            min_container_chars: 200,
            max_body_bytes: 5 * 1024 * 1024,
            selector_wait: Duration::from_secs(2),
        }
    }
}

/// Everything the escalation rules may inspect about a failed lightweight
/// fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationContext<'a> {
    /// HTTP status of the lightweight response, if one arrived.
    pub status: Option<u16>,
    /// Display text of the lightweight failure.
    pub error_text: &'a str,
    /// The lightweight fetch hit its deadline.
    pub timed_out: bool,
    /// The lightweight fetch produced only low-quality text.
    pub low_quality: bool,
    /// The response body carried challenge-page markers.
    pub body_marked: bool,
    /// The URL's host is on the known JS-heavy list.
    pub js_heavy_host: bool,
}

/// One escalation rule: a name for logs and audits, and its predicate.
pub struct EscalationRule {
    /// Stable identifier, reported when the rule fires.
    pub name: &'static str,
    /// Whether this rule applies to the given failure.
    pub matches: fn(&EscalationContext) -> bool,
}

/// Ordered escalation policy. The first matching rule wins; if none match,
/// the lightweight failure is propagated unchanged.
pub const ESCALATION_RULES: &[EscalationRule] = &[
    EscalationRule {
        name: "blocked-status",
        matches: |c| matches!(c.status, Some(403) | Some(429) | Some(503)),
    },
    EscalationRule {
        name: "timeout",
        matches: |c| c.timed_out,
    },
    EscalationRule {
        name: "denial-text",
        matches: |c| {
            let text = c.error_text.to_lowercase();
            text.contains("access denied") || text.contains("forbidden")
        },
    },
    EscalationRule {
        name: "low-quality-content",
        matches: |c| c.low_quality,
    },
    EscalationRule {
        name: "challenge-markers",
        matches: |c| c.body_marked,
    },
    EscalationRule {
        name: "js-heavy-host",
        matches: |c| c.js_heavy_host,
    },
];

/// Returns the first escalation rule matching `ctx`, if any.
pub fn escalation_rule(ctx: &EscalationContext) -> Option<&'static EscalationRule> {
    ESCALATION_RULES.iter().find(|rule| (rule.matches)(ctx))
}

/// A failed lightweight fetch, annotated for the escalation decision.
struct LightweightFailure {
    error: SearchError,
    status: Option<u16>,
    timed_out: bool,
    low_quality: bool,
    body_marked: bool,
}

impl LightweightFailure {
    fn from_error(error: SearchError) -> Self {
        Self {
            timed_out: matches!(error, SearchError::Timeout),
            error,
            status: None,
            low_quality: false,
            body_marked: false,
        }
    }
}

/// Extracts readable article text from URLs, escalating from plain HTTP to
/// a rendered browser fetch when bot defenses get in the way.
pub struct ExtractionPipeline {
    http: Client,
    pool: Arc<BrowserPool>,
    config: ExtractConfig,
}

impl ExtractionPipeline {
    /// Creates a pipeline over the given browser pool with default settings.
    pub fn new(pool: Arc<BrowserPool>) -> Self {
        Self::with_config(pool, ExtractConfig::default())
    }

    /// Creates a pipeline with explicit configuration.
    pub fn with_config(pool: Arc<BrowserPool>, config: ExtractConfig) -> Self {
        Self {
            http: Client::builder()
                .gzip(true)
                .brotli(true)
                .build()
                .expect("Failed to create HTTP client"),
            pool,
            config,
        }
    }

    /// The pipeline's configuration.
    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Extracts readable text from `url`, truncated to `max_length`
    /// characters.
    pub async fn extract(&self, url: &str, max_length: usize, timeout: Duration) -> Result<String> {
        let persona = Persona::random();

        let failure = match self.fetch_lightweight(url, max_length, timeout, persona).await {
            Ok(text) => return Ok(text),
            Err(failure) => failure,
        };

        let error_text = failure.error.to_string();
        let ctx = EscalationContext {
            status: failure.status,
            error_text: &error_text,
            timed_out: failure.timed_out,
            low_quality: failure.low_quality,
            body_marked: failure.body_marked,
            js_heavy_host: host_of(url).is_some_and(|h| is_js_heavy_host(&h)),
        };

        match escalation_rule(&ctx) {
            Some(rule) => {
                debug!(url, rule = rule.name, "Escalating to rendered fetch");
                self.fetch_rendered(url, max_length, timeout, persona).await
            }
            None => Err(failure.error),
        }
    }

    /// Bulk extraction over a result set.
    ///
    /// Non-article URLs are dropped up front; up to `min(2 × target, 10)`
    /// candidates run concurrently, each bounded by an outer race timeout
    /// slightly above the per-call budget so one stalled page cannot hold
    /// the batch. Returns up to `target_count` results, successes first.
    pub async fn extract_for_results(
        &self,
        results: &[SearchResult],
        target_count: usize,
    ) -> Vec<SearchResult> {
        let candidate_cap = (2 * target_count).min(10);
        let candidates: Vec<SearchResult> = results
            .iter()
            .filter(|r| is_article_url(&r.url))
            .take(candidate_cap)
            .cloned()
            .collect();

        let skipped = results.len().saturating_sub(candidates.len());
        if skipped > 0 {
            debug!(skipped, "Bulk extraction dropped non-article or overflow candidates");
        }

        let outer_timeout = self.config.timeout + Duration::from_secs(5);
        let tasks = candidates.into_iter().map(|result| async move {
            let attempt = self.extract(&result.url, self.config.max_length, self.config.timeout);
            match tokio::time::timeout(outer_timeout, attempt).await {
                Ok(Ok(text)) => result.with_content(text),
                Ok(Err(e)) => {
                    warn!(url = %result.url, "Extraction failed: {e}");
                    result.with_fetch_error(e.classified_message())
                }
                Err(_) => {
                    warn!(url = %result.url, "Extraction exceeded batch ceiling");
                    result.with_fetch_error(SearchError::Timeout.classified_message())
                }
            }
        });

        let extracted = futures::future::join_all(tasks).await;
        prefer_successes(extracted, target_count)
    }

    /// Tier 1: plain HTTP fetch with persona headers.
    async fn fetch_lightweight(
        &self,
        url: &str,
        max_length: usize,
        timeout: Duration,
        persona: &Persona,
    ) -> std::result::Result<String, LightweightFailure> {
        let response = match self
            .http
            .get(url)
            .headers(persona.headers())
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(LightweightFailure::from_error(SearchError::Timeout))
            }
            Err(e) => return Err(LightweightFailure::from_error(e.into())),
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Err(LightweightFailure::from_error(e.into())),
        };

        if body.len() > self.config.max_body_bytes {
            return Err(LightweightFailure {
                error: SearchError::TooLarge(body.len()),
                status: Some(status),
                timed_out: false,
                low_quality: false,
                body_marked: false,
            });
        }

        let body_marked = has_challenge_markers(&body);

        if let Some(error) = classify_status(status) {
            return Err(LightweightFailure {
                error,
                status: Some(status),
                timed_out: false,
                low_quality: false,
                body_marked,
            });
        }

        let text = extract_readable(&body, self.config.min_container_chars);
        if is_low_quality(&text) {
            return Err(LightweightFailure {
                error: SearchError::LowQuality,
                status: Some(status),
                timed_out: false,
                low_quality: true,
                body_marked,
            });
        }

        Ok(truncate_to(text, max_length))
    }

    /// Tier 2: rendered fetch through the shared browser pool.
    async fn fetch_rendered(
        &self,
        url: &str,
        max_length: usize,
        timeout: Duration,
        persona: &'static Persona,
    ) -> Result<String> {
        let session = self.pool.session(persona).await?;
        let outcome = self.render_and_extract(&session, url, max_length, timeout).await;
        session.close().await;
        outcome
    }

    async fn render_and_extract(
        &self,
        session: &Session,
        url: &str,
        max_length: usize,
        timeout: Duration,
    ) -> Result<String> {
        let page = session.page();

        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(SearchError::Browser(format!("Navigation failed: {e}"))),
            Err(_) => return Err(SearchError::Timeout),
        }

        humanlike_interaction(page).await;

        // Give late-rendering containers a short grace period; a miss is
        // fine, the page may simply use other markup.
        let _ = tokio::time::timeout(
            self.config.selector_wait,
            page.find_element("article, main, #content"),
        )
        .await;

        let html = page
            .content()
            .await
            .map_err(|e| SearchError::Browser(format!("Failed to read rendered page: {e}")))?;

        let text = extract_readable(&html, self.config.min_container_chars);
        if is_low_quality(&text) {
            return Err(SearchError::LowQuality);
        }
        Ok(truncate_to(text, max_length))
    }
}

/// Random pointer movement, a small scroll, and a randomized pause, to look
/// less like a script that reads a page in zero milliseconds.
async fn humanlike_interaction(page: &chromiumoxide::Page) {
    let (x, y, scroll, pause_ms) = {
        let mut rng = rand::rng();
        (
            rng.random_range(60..800),
            rng.random_range(80..500),
            rng.random_range(120..700),
            rng.random_range(500..1500),
        )
    };

    let script = format!(
        "(() => {{ \
             document.dispatchEvent(new MouseEvent('mousemove', \
                 {{ clientX: {x}, clientY: {y}, bubbles: true }})); \
             window.scrollBy(0, {scroll}); \
         }})()"
    );
    if let Err(e) = page.evaluate(script).await {
        debug!("Humanlike interaction script failed: {e}");
    }

    tokio::time::sleep(Duration::from_millis(pause_ms)).await;
}

/// Maps a lightweight-fetch HTTP status to a failure, or `None` for 2xx.
fn classify_status(status: u16) -> Option<SearchError> {
    match status {
        200..=299 => None,
        404 => Some(SearchError::NotFound),
        403 | 429 | 503 => Some(SearchError::Denied(status)),
        other => Some(SearchError::Status(other)),
    }
}

/// Reduces an HTML document to readable text.
///
/// Tries content containers in priority order, accepting the first whose
/// cleaned text passes the length floor, then falls back to the whole
/// document.
pub(crate) fn extract_readable(html: &str, floor: usize) -> String {
    let document = Html::parse_document(html);

    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(container) = document.select(&selector).next() {
            let text = clean_text(container);
            if text.len() >= floor {
                return text;
            }
        }
    }

    clean_text(document.root_element())
}

/// Collects text below `root`, skipping stripped tags, noise-marked regions
/// and empty nodes, normalizing whitespace runs to single spaces.
fn clean_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(root, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            for word in text.split_whitespace() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(word);
            }
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !element_is_noise(child_element.value()) {
                collect_text(child_element, out);
            }
        }
    }
}

fn element_is_noise(element: &scraper::node::Element) -> bool {
    if STRIP_TAGS.contains(&element.name()) {
        return true;
    }
    for attr in ["class", "id"] {
        if let Some(value) = element.attr(attr) {
            let value = value.to_lowercase();
            let noisy = value
                .split(|c: char| !c.is_ascii_alphanumeric())
                .any(|token| NOISE_TOKENS.contains(&token));
            if noisy {
                return true;
            }
        }
    }
    false
}

fn has_challenge_markers(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Text under 100 characters, blank, or carrying challenge markers is a
/// failed extraction.
pub(crate) fn is_low_quality(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.len() < LOW_QUALITY_CHARS || has_challenge_markers(trimmed)
}

/// Silently truncates to `max_length` characters. Overlength content is
/// never an error; the cut is only logged.
fn truncate_to(text: String, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text;
    }
    debug!(max_length, "Truncating extracted content");
    text.chars().take(max_length).collect()
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

fn is_js_heavy_host(host: &str) -> bool {
    JS_HEAVY_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
}

static NON_ARTICLE_RE: OnceLock<Regex> = OnceLock::new();

/// Whether a URL plausibly points at an HTML article rather than a binary
/// document or media file.
pub(crate) fn is_article_url(url: &str) -> bool {
    let re = NON_ARTICLE_RE.get_or_init(|| {
        Regex::new(r"(?i)\.(pdf|docx?|pptx?|xlsx?|zip|rar|7z|gz|mp3|mp4|avi|mkv|webm|jpe?g|png|gif|svg)(\?.*)?$")
            .expect("static regex is valid")
    });
    !re.is_match(url)
}

/// Up to `target` results, successes before failures.
pub(crate) fn prefer_successes(results: Vec<SearchResult>, target: usize) -> Vec<SearchResult> {
    let (mut picked, failed): (Vec<_>, Vec<_>) = results
        .into_iter()
        .partition(|r| r.fetch_status == FetchStatus::Success);
    picked.extend(failed);
    picked.truncate(target);
    picked
}
