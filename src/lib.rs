//! # scour
//!
//! A resilient web-search-and-extraction library.
//!
//! Given a query, `scour` walks a fixed-priority list of search backends,
//! scores each result set against the query, and returns the best one.
//! Given a URL, it extracts readable article text, escalating from a plain
//! HTTP fetch to a rendered browser fetch when bot defenses get in the way.
//! Supporting machinery keeps this workable against adversarial upstreams:
//!
//! - A shared pool of one rotating headless-browser process, handing out
//!   isolated persona-fingerprinted sessions
//! - Rolling-window rate limiting, plus a durable monthly quota for capped
//!   API backends
//! - A background reaper that reclaims leaked browser processes
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use scour::{BrowserPool, BrowserPoolConfig, ExtractionPipeline, SearchOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = Arc::new(BrowserPool::new(BrowserPoolConfig::default()));
//!     let orchestrator = SearchOrchestrator::with_default_engines(Arc::clone(&pool));
//!
//!     let (results, engine) = orchestrator
//!         .search("rust async runtimes", 5, Duration::from_secs(10))
//!         .await?;
//!     println!("{} results via {engine}", results.len());
//!
//!     let pipeline = ExtractionPipeline::new(Arc::clone(&pool));
//!     let enriched = pipeline.extract_for_results(&results, 3).await;
//!     for result in enriched {
//!         println!("{}: {} words", result.url, result.word_count);
//!     }
//!
//!     pool.close_all().await;
//!     Ok(())
//! }
//! ```

mod browser;
mod browser_setup;
mod engine;
mod error;
mod extract;
mod limiter;
mod persona;
mod quality;
mod reaper;
mod result;
mod search;

pub mod engines;

pub use browser::{
    BrowserHandle, BrowserPool, BrowserPoolConfig, Session, MAX_SESSIONS_PER_BROWSER,
    PROFILE_MARKER,
};
pub use browser_setup::{detect_chrome, require_chrome};
pub use engine::SearchEngine;
pub use error::{Result, SearchError};
pub use extract::{
    escalation_rule, EscalationContext, EscalationRule, ExtractConfig, ExtractionPipeline,
    ESCALATION_RULES,
};
pub use limiter::{MonthlyUsage, QuotaLimiter, RateLimiter};
pub use persona::{Persona, PERSONAS};
pub use quality::QualityScorer;
pub use reaper::{
    ProcessReaper, ProcessRecord, ReaperConfig, ReaperHandle, ReaperStats, SweepOutcome,
};
pub use result::{FetchStatus, SearchResult};
pub use search::{OrchestratorConfig, SearchOrchestrator};
