//! Zero-result backoff: skip corpora that already came back empty for a
//! shorter version of the current query.
//!
//! The strategy remembers, per corpus, the shortest query that produced no
//! rows. While the user keeps typing on the same prefix chain the corpus is
//! skipped. The memo follows the query the user is working on:
//!
//! ```text
//! "ab" -> "abc"   refinement   memo kept
//! "abc" -> "ab"   widening     entries longer than "ab" dropped
//! "ab" -> "xy"    unrelated    memo cleared
//! ```

use std::collections::HashMap;
use std::sync::Mutex;

use crate::corpus::Corpus;

#[derive(Debug, Default)]
struct MemoState {
    prev_query: String,
    /// Corpus name to the shortest query it returned nothing for.
    empty_corpora: HashMap<String, String>,
}

impl MemoState {
    fn update_query(&mut self, query: &str) {
        if query.starts_with(self.prev_query.as_str()) {
            // Refinement: every memo entry is still a prefix of the query.
        } else if self.prev_query.starts_with(query) {
            self.empty_corpora
                .retain(|_, zero_query| zero_query.len() <= query.len());
        } else {
            self.empty_corpora.clear();
        }
        if self.prev_query != query {
            self.prev_query = query.to_owned();
        }
    }
}

/// Decides per corpus and query whether a query is worth issuing.
///
/// Thread-safe: the coordinator asks from the caller's thread and records
/// zero results from the publish task.
#[derive(Debug, Default)]
pub struct ShouldQueryStrategy {
    state: Mutex<MemoState>,
}

impl ShouldQueryStrategy {
    /// Creates a strategy with an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the memo to `query` without asking about any corpus.
    pub fn update_query(&self, query: &str) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .update_query(query);
    }

    /// Whether `corpus` should be queried for `query`.
    ///
    /// False when the query is shorter than the corpus threshold, or when
    /// the corpus returned nothing for a strict prefix of `query` and does
    /// not ask to be queried after zero results.
    pub fn should_query(&self, corpus: &Corpus, query: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.update_query(query);

        if query.chars().count() < corpus.query_threshold {
            tracing::trace!(corpus = %corpus.name, query, "below query threshold");
            return false;
        }
        if corpus.query_after_zero_results {
            return true;
        }
        match state.empty_corpora.get(&corpus.name) {
            Some(zero_query)
                if query.len() > zero_query.len() && query.starts_with(zero_query.as_str()) =>
            {
                tracing::debug!(
                    corpus = %corpus.name,
                    query,
                    zero_query = %zero_query,
                    "skipping corpus after zero results"
                );
                false
            }
            _ => true,
        }
    }

    /// Records that `corpus` returned no rows for `query`.
    ///
    /// Ignored for the empty query, for corpora that query after zero
    /// results, and for queries that are not a prefix of the current one
    /// (stale answers for a query the user has moved away from).
    pub fn on_zero_results(&self, corpus: &Corpus, query: &str) {
        if query.is_empty() || corpus.query_after_zero_results {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.prev_query.starts_with(query) {
            return;
        }
        let entry = state
            .empty_corpora
            .entry(corpus.name.clone())
            .or_insert_with(|| query.to_owned());
        if query.len() < entry.len() {
            *entry = query.to_owned();
        }
        tracing::trace!(corpus = %corpus.name, query, "recorded zero results");
    }

    /// Forgets every recorded zero result.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.empty_corpora.clear();
        state.prev_query.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(name: &str) -> Corpus {
        Corpus::new(name, vec![])
    }

    #[test]
    fn zero_results_skip_refinements() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus("apps");
        assert!(strategy.should_query(&c, "ab"));
        strategy.on_zero_results(&c, "ab");

        assert!(!strategy.should_query(&c, "abc"));
        assert!(!strategy.should_query(&c, "abcd"));
    }

    #[test]
    fn update_query_alone_accepts_zero_results() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus("contacts");
        strategy.update_query("zz");
        strategy.on_zero_results(&c, "zz");
        assert!(!strategy.should_query(&c, "zzz"));
    }

    #[test]
    fn unrelated_query_is_queried_again() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus("apps");
        strategy.should_query(&c, "ab");
        strategy.on_zero_results(&c, "ab");

        assert!(strategy.should_query(&c, "xy"));
        // The memo was cleared by the unrelated query.
        assert!(strategy.should_query(&c, "abc"));
    }

    #[test]
    fn corpus_querying_after_zero_results_is_never_skipped() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus("web").web().query_after_zero_results();
        strategy.should_query(&c, "ab");
        strategy.on_zero_results(&c, "ab");
        assert!(strategy.should_query(&c, "abc"));
    }

    #[test]
    fn memo_is_per_corpus() {
        let strategy = ShouldQueryStrategy::new();
        let apps = corpus("apps");
        let music = corpus("music");
        strategy.should_query(&apps, "ab");
        strategy.on_zero_results(&apps, "ab");
        assert!(!strategy.should_query(&apps, "abc"));
        assert!(strategy.should_query(&music, "abc"));
    }

    #[test]
    fn widening_drops_longer_entries() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus("apps");
        strategy.should_query(&c, "abc");
        strategy.on_zero_results(&c, "abc");
        assert!(!strategy.should_query(&c, "abcd"));

        // Backspace to "ab": the "abc" entry no longer applies.
        assert!(strategy.should_query(&c, "ab"));
        assert!(strategy.should_query(&c, "abx"));
    }

    #[test]
    fn widening_keeps_shorter_entries() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus("apps");
        strategy.should_query(&c, "abcd");
        strategy.on_zero_results(&c, "ab");
        strategy.should_query(&c, "abc");
        assert!(!strategy.should_query(&c, "abc"));
    }

    #[test]
    fn stale_zero_results_are_ignored() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus("apps");
        strategy.should_query(&c, "xy");
        strategy.on_zero_results(&c, "ab");
        strategy.should_query(&c, "xyz");
        assert!(strategy.should_query(&c, "abc"));
    }

    #[test]
    fn empty_query_zero_results_not_recorded() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus("apps").accepts_empty_query();
        strategy.should_query(&c, "");
        strategy.on_zero_results(&c, "");
        assert!(strategy.should_query(&c, "a"));
    }

    #[test]
    fn threshold_counts_characters() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus("contacts").with_query_threshold(3);
        assert!(!strategy.should_query(&c, "ab"));
        assert!(strategy.should_query(&c, "abc"));
        assert!(!strategy.should_query(&c, "éé"));
        assert!(strategy.should_query(&c, "ééé"));
    }

    #[test]
    fn reset_clears_memo() {
        let strategy = ShouldQueryStrategy::new();
        let c = corpus("apps");
        strategy.should_query(&c, "ab");
        strategy.on_zero_results(&c, "ab");
        strategy.reset();
        assert!(strategy.should_query(&c, "abc"));
    }
}
