//! Heuristic relevance scoring for result sets.

use crate::SearchResult;

/// Minimum word length for a query word to count toward scoring.
const MIN_WORD_LEN: usize = 4;

/// Scores how well a result set matches a query.
///
/// The score is the fraction of results whose title or description contains
/// at least one significant query word. Queries with no significant words
/// are accepted optimistically.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl QualityScorer {
    /// Creates a new scorer.
    pub fn new() -> Self {
        Self
    }

    /// Returns a relevance score in `[0, 1]` for `results` against `query`.
    ///
    /// Words shorter than four characters are ignored; if no query word
    /// qualifies, the set is too short to judge and scores 1.0. An empty
    /// result set scores 0.0.
    pub fn score(&self, results: &[SearchResult], query: &str) -> f64 {
        if results.is_empty() {
            return 0.0;
        }

        let words: Vec<String> = query
            .split_whitespace()
            .filter(|w| w.len() >= MIN_WORD_LEN)
            .map(|w| w.to_lowercase())
            .collect();

        if words.is_empty() {
            return 1.0;
        }

        let matches = results
            .iter()
            .filter(|r| {
                let title = r.title.to_lowercase();
                let description = r.description.to_lowercase();
                words
                    .iter()
                    .any(|w| title.contains(w.as_str()) || description.contains(w.as_str()))
            })
            .count();

        matches as f64 / results.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, description: &str) -> SearchResult {
        SearchResult::new(title, "https://example.com", description)
    }

    #[test]
    fn test_score_all_matching() {
        let scorer = QualityScorer::new();
        let results = vec![
            result("Rust programming guide", ""),
            result("", "learn programming fast"),
        ];
        assert_eq!(scorer.score(&results, "programming"), 1.0);
    }

    #[test]
    fn test_score_partial_match() {
        let scorer = QualityScorer::new();
        let results = vec![
            result("Rust programming guide", ""),
            result("Cooking for beginners", "recipes"),
        ];
        assert_eq!(scorer.score(&results, "programming"), 0.5);
    }

    #[test]
    fn test_score_no_matches() {
        let scorer = QualityScorer::new();
        let results = vec![result("Cooking", "recipes"), result("Gardening", "soil")];
        assert_eq!(scorer.score(&results, "quantum computing"), 0.0);
    }

    #[test]
    fn test_score_short_query_accepted() {
        let scorer = QualityScorer::new();
        let results = vec![result("anything", "at all")];
        // "to be" has no word of length >= 4, so the set is accepted.
        assert_eq!(scorer.score(&results, "to be"), 1.0);
    }

    #[test]
    fn test_score_empty_results() {
        let scorer = QualityScorer::new();
        assert_eq!(scorer.score(&[], "programming"), 0.0);
    }

    #[test]
    fn test_score_case_insensitive() {
        let scorer = QualityScorer::new();
        let results = vec![result("RUST Programming", "")];
        assert_eq!(scorer.score(&results, "rust"), 1.0);
    }

    #[test]
    fn test_score_ratio_formula() {
        let scorer = QualityScorer::new();
        let results = vec![
            result("tokio runtime internals", ""),
            result("tokio scheduler", ""),
            result("unrelated", ""),
            result("nothing here", ""),
        ];
        assert_eq!(scorer.score(&results, "tokio"), 0.5);
    }

    #[test]
    fn test_score_always_in_unit_interval() {
        let scorer = QualityScorer::new();
        let queries = ["", "a b c", "longword", "mixed tiny longword"];
        let results = vec![result("longword here", ""), result("other", "")];
        for q in queries {
            let s = scorer.score(&results, q);
            assert!((0.0..=1.0).contains(&s), "score {s} out of range for {q:?}");
        }
    }
}
