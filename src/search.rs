//! Search orchestration: priority fallback across backends.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::engines::{Bing, BraveApi, DuckDuckGo, GoogleBrowser};
use crate::limiter::RateLimiter;
use crate::quality::QualityScorer;
use crate::{BrowserPool, Result, SearchEngine, SearchError, SearchResult};

/// Score at which any backend's results are accepted outright.
const HIGH_QUALITY: f64 = 0.8;

/// Upper bound on a single backend attempt, regardless of the caller's
/// overall budget.
const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Minimum score for a non-baseline backend to win early, and for the
    /// final best-so-far to count as non-degraded.
    pub quality_threshold: f64,
    /// When off, every result set is treated as score 1.0.
    pub scoring_enabled: bool,
    /// When on, early returns are disabled and every backend is consulted.
    pub force_multi_engine: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 0.5,
            scoring_enabled: true,
            force_multi_engine: false,
        }
    }
}

/// One backend's outcome, kept while the fallback walk continues.
struct EngineAttempt {
    engine: String,
    results: Vec<SearchResult>,
    quality: f64,
}

/// Walks an ordered list of search backends, scoring each result set and
/// returning the first acceptable one.
///
/// The first backend in the list is the baseline: its results are cheap but
/// need corroboration, so they only win early on a very high score. Every
/// search call is paced by a rolling-window rate limiter.
pub struct SearchOrchestrator {
    engines: Vec<Arc<dyn SearchEngine>>,
    scorer: QualityScorer,
    limiter: RateLimiter,
    config: OrchestratorConfig,
}

impl SearchOrchestrator {
    /// Creates an empty orchestrator with default configuration.
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    /// Creates an empty orchestrator with explicit configuration.
    pub fn with_config(config: OrchestratorConfig) -> Self {
        Self {
            engines: Vec::new(),
            scorer: QualityScorer::new(),
            limiter: RateLimiter::for_search(),
            config,
        }
    }

    /// The standard backend roster: Bing (baseline), DuckDuckGo, the Brave
    /// API when a key is configured, and rendered Google as the last
    /// resort.
    pub fn with_default_engines(pool: Arc<BrowserPool>) -> Self {
        let mut orchestrator = Self::new();
        orchestrator.add_engine(Bing::new());
        orchestrator.add_engine(DuckDuckGo::new());
        if let Some(brave) = BraveApi::from_env() {
            orchestrator.add_engine(brave);
        }
        orchestrator.add_engine(GoogleBrowser::new(pool));
        orchestrator
    }

    /// Appends a backend; earlier backends have higher priority.
    pub fn add_engine<E: SearchEngine + 'static>(&mut self, engine: E) {
        self.engines.push(Arc::new(engine));
    }

    /// Number of configured backends.
    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    /// Backend names in priority order.
    pub fn engine_names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.name().to_string()).collect()
    }

    /// Searches across the backend list, returning the chosen result set
    /// and the name of the backend that produced it.
    ///
    /// Total backend failure is not an error: it yields `(vec![], "None")`.
    pub async fn search(
        &self,
        query: &str,
        num_results: usize,
        timeout: Duration,
    ) -> Result<(Vec<SearchResult>, String)> {
        if self.engines.is_empty() {
            return Err(SearchError::NoEngines);
        }
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery("Query cannot be empty".into()));
        }

        self.limiter
            .execute(|| self.run_fallback(query, num_results, timeout))
            .await
    }

    async fn run_fallback(
        &self,
        query: &str,
        num_results: usize,
        total_timeout: Duration,
    ) -> Result<(Vec<SearchResult>, String)> {
        let attempt_timeout = (total_timeout / 3).min(MAX_ATTEMPT_TIMEOUT);
        let mut best: Option<EngineAttempt> = None;

        for (index, engine) in self.engines.iter().enumerate() {
            let is_baseline = index == 0;
            let name = engine.name().to_string();

            let results = match timeout(
                attempt_timeout,
                engine.attempt(query, num_results, attempt_timeout),
            )
            .await
            {
                Ok(Ok(results)) => results,
                Ok(Err(e)) => {
                    warn!(engine = %name, "Backend attempt failed: {e}");
                    continue;
                }
                Err(_) => {
                    warn!(engine = %name, "Backend attempt timed out");
                    continue;
                }
            };

            if results.is_empty() {
                debug!(engine = %name, "Backend returned no results");
                continue;
            }

            let quality = if self.config.scoring_enabled {
                self.scorer.score(&results, query)
            } else {
                1.0
            };
            debug!(engine = %name, quality, count = results.len(), "Backend attempt scored");

            if !self.config.force_multi_engine {
                if quality >= HIGH_QUALITY {
                    return Ok((results, name));
                }
                // The baseline backend needs a second opinion at this
                // score; later backends do not.
                if quality >= self.config.quality_threshold && !is_baseline {
                    return Ok((results, name));
                }
            }

            if best.as_ref().map_or(true, |b| quality > b.quality) {
                best = Some(EngineAttempt {
                    engine: name,
                    results,
                    quality,
                });
            }
        }

        match best {
            Some(attempt)
                if attempt.quality >= self.config.quality_threshold
                    || !self.config.scoring_enabled =>
            {
                Ok((attempt.results, attempt.engine))
            }
            Some(attempt) => {
                warn!(
                    engine = %attempt.engine,
                    quality = attempt.quality,
                    "Every backend scored below threshold, returning best available"
                );
                Ok((attempt.results, attempt.engine))
            }
            None => Ok((Vec::new(), "None".to_string())),
        }
    }
}

impl Default for SearchOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockEngine {
        name: String,
        results: Vec<SearchResult>,
        calls: Arc<AtomicU32>,
    }

    impl MockEngine {
        fn new(name: &str, results: Vec<SearchResult>) -> Self {
            Self {
                name: name.to_string(),
                results,
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn call_counter(&self) -> Arc<AtomicU32> {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl SearchEngine for MockEngine {
        fn name(&self) -> &str {
            &self.name
        }

        async fn attempt(
            &self,
            _query: &str,
            _limit: usize,
            _timeout: Duration,
        ) -> Result<Vec<SearchResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.results.clone())
        }
    }

    struct FailingEngine {
        name: String,
    }

    #[async_trait]
    impl SearchEngine for FailingEngine {
        fn name(&self) -> &str {
            &self.name
        }

        async fn attempt(
            &self,
            _query: &str,
            _limit: usize,
            _timeout: Duration,
        ) -> Result<Vec<SearchResult>> {
            Err(SearchError::Other("backend down".to_string()))
        }
    }

    fn failing(name: &str) -> FailingEngine {
        FailingEngine {
            name: name.to_string(),
        }
    }

    /// `count` results, `matching` of which contain the scoring word.
    fn result_set(count: usize, matching: usize) -> Vec<SearchResult> {
        (0..count)
            .map(|i| {
                let title = if i < matching {
                    format!("tokio article {i}")
                } else {
                    format!("unrelated item {i}")
                };
                SearchResult::new(title, format!("https://example.com/{i}"), "")
            })
            .collect()
    }

    const QUERY: &str = "tokio";

    #[tokio::test]
    async fn test_no_engines_is_an_error() {
        let orchestrator = SearchOrchestrator::new();
        let out = orchestrator.search(QUERY, 3, Duration::from_secs(10)).await;
        assert!(matches!(out, Err(SearchError::NoEngines)));
    }

    #[tokio::test]
    async fn test_empty_query_is_an_error() {
        let mut orchestrator = SearchOrchestrator::new();
        orchestrator.add_engine(MockEngine::new("A", result_set(2, 2)));
        let out = orchestrator.search("   ", 3, Duration::from_secs(10)).await;
        assert!(matches!(out, Err(SearchError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_high_quality_returns_early_without_later_backends() {
        let mut orchestrator = SearchOrchestrator::new();
        orchestrator.add_engine(failing("A"));
        orchestrator.add_engine(failing("B"));
        orchestrator.add_engine(MockEngine::new("C", result_set(4, 4)));
        let tracker = MockEngine::new("D", result_set(4, 4));
        let tracker_calls = tracker.call_counter();
        orchestrator.add_engine(tracker);

        let (results, engine) = orchestrator
            .search(QUERY, 4, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(engine, "C");
        assert_eq!(results.len(), 4);
        assert_eq!(tracker_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_baseline_needs_corroboration_at_threshold_score() {
        // Baseline scores 0.5: at the threshold, but not high quality, so
        // the walk continues; the next backend at the same score wins.
        let mut orchestrator = SearchOrchestrator::new();
        orchestrator.add_engine(MockEngine::new("Baseline", result_set(4, 2)));
        orchestrator.add_engine(MockEngine::new("Second", result_set(4, 2)));
        let tracker = MockEngine::new("Third", result_set(4, 4));
        let tracker_calls = tracker.call_counter();
        orchestrator.add_engine(tracker);

        let (_, engine) = orchestrator
            .search(QUERY, 4, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(engine, "Second");
        assert_eq!(tracker_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_baseline_wins_early_on_high_quality() {
        let mut orchestrator = SearchOrchestrator::new();
        orchestrator.add_engine(MockEngine::new("Baseline", result_set(4, 4)));
        let tracker = MockEngine::new("Second", result_set(4, 4));
        let tracker_calls = tracker.call_counter();
        orchestrator.add_engine(tracker);

        let (_, engine) = orchestrator
            .search(QUERY, 4, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(engine, "Baseline");
        assert_eq!(tracker_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_backends_failing_yields_none_sentinel() {
        let mut orchestrator = SearchOrchestrator::new();
        orchestrator.add_engine(failing("A"));
        orchestrator.add_engine(failing("B"));
        orchestrator.add_engine(failing("C"));

        let (results, engine) = orchestrator
            .search(QUERY, 3, Duration::from_secs(10))
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(engine, "None");
    }

    #[tokio::test]
    async fn test_all_backends_empty_yields_none_sentinel() {
        let mut orchestrator = SearchOrchestrator::new();
        orchestrator.add_engine(MockEngine::new("A", vec![]));
        orchestrator.add_engine(MockEngine::new("B", vec![]));

        let (results, engine) = orchestrator
            .search(QUERY, 3, Duration::from_secs(10))
            .await
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(engine, "None");
    }

    #[tokio::test]
    async fn test_degraded_best_is_returned_when_all_below_threshold() {
        let mut orchestrator = SearchOrchestrator::new();
        orchestrator.add_engine(MockEngine::new("A", result_set(4, 0)));
        orchestrator.add_engine(MockEngine::new("B", result_set(4, 1)));

        let (results, engine) = orchestrator
            .search(QUERY, 4, Duration::from_secs(10))
            .await
            .unwrap();

        // 0.25 is under the threshold, but a non-empty set still wins over
        // nothing.
        assert_eq!(engine, "B");
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn test_scoring_disabled_accepts_first_success() {
        let mut orchestrator = SearchOrchestrator::with_config(OrchestratorConfig {
            scoring_enabled: false,
            ..OrchestratorConfig::default()
        });
        orchestrator.add_engine(MockEngine::new("A", result_set(3, 0)));
        let tracker = MockEngine::new("B", result_set(3, 3));
        let tracker_calls = tracker.call_counter();
        orchestrator.add_engine(tracker);

        let (_, engine) = orchestrator
            .search(QUERY, 3, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(engine, "A");
        assert_eq!(tracker_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_force_multi_engine_consults_every_backend() {
        let mut orchestrator = SearchOrchestrator::with_config(OrchestratorConfig {
            force_multi_engine: true,
            ..OrchestratorConfig::default()
        });
        orchestrator.add_engine(MockEngine::new("A", result_set(4, 4)));
        let tail = MockEngine::new("B", result_set(4, 1));
        let tail_calls = tail.call_counter();
        orchestrator.add_engine(tail);

        let (_, engine) = orchestrator
            .search(QUERY, 4, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(engine, "A");
        assert_eq!(tail_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_the_walk() {
        let mut orchestrator = SearchOrchestrator::new();
        orchestrator.add_engine(failing("A"));
        orchestrator.add_engine(MockEngine::new("B", result_set(3, 3)));

        let (results, engine) = orchestrator
            .search(QUERY, 3, Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(engine, "B");
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_engine_names_in_priority_order() {
        let mut orchestrator = SearchOrchestrator::new();
        orchestrator.add_engine(MockEngine::new("First", vec![]));
        orchestrator.add_engine(MockEngine::new("Second", vec![]));
        assert_eq!(orchestrator.engine_names(), vec!["First", "Second"]);
        assert_eq!(orchestrator.engine_count(), 2);
    }
}
