//! Corpus ranking: the order corpora are queried and promoted in.
//!
//! Rankers cache their order and drop it when the registry reports a
//! change to the corpus set.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::corpus::Corpus;
use crate::observer::Observer;
use crate::registry::CorpusRegistry;
use crate::shortcuts::ShortcutRepository;

/// Orders enabled corpora by importance.
pub trait CorpusRanker: Send + Sync {
    /// Enabled corpora, most important first, without duplicates.
    fn ranked_corpora(&self) -> Vec<Arc<Corpus>>;

    /// Drops the cached order.
    fn on_corpus_set_changed(&self);
}

type RankCache = Arc<Mutex<Option<Vec<Arc<Corpus>>>>>;

/// Registry subscription that clears a ranker's cache, unregistered on drop.
struct CacheInvalidation {
    registry: Arc<CorpusRegistry>,
    cache: RankCache,
    observer: Arc<dyn Observer>,
}

impl CacheInvalidation {
    fn subscribe(registry: Arc<CorpusRegistry>) -> Self {
        let cache: RankCache = Arc::new(Mutex::new(None));
        let target = Arc::clone(&cache);
        let observer: Arc<dyn Observer> = Arc::new(move || {
            *target.lock().unwrap_or_else(|e| e.into_inner()) = None;
        });
        registry.register_observer(Arc::clone(&observer));
        Self {
            registry,
            cache,
            observer,
        }
    }

    fn get_or_compute(&self, compute: impl FnOnce() -> Vec<Arc<Corpus>>) -> Vec<Arc<Corpus>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get_or_insert_with(compute).clone()
    }

    fn clear(&self) {
        *self.cache.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Drop for CacheInvalidation {
    fn drop(&mut self) {
        self.registry.unregister_observer(&self.observer);
    }
}

/// Ranks by default-enabled status, then click score.
///
/// Ordering:
/// 1. default-enabled corpora before the rest
/// 2. within a tier, the web corpus first
/// 3. then by click score from the shortcut repository, descending
///    (corpora with no score count as 0)
/// 4. then by name
pub struct DefaultCorpusRanker {
    invalidation: CacheInvalidation,
    shortcuts: Arc<dyn ShortcutRepository>,
}

impl DefaultCorpusRanker {
    /// Creates a ranker over the registry's enabled corpora.
    pub fn new(registry: Arc<CorpusRegistry>, shortcuts: Arc<dyn ShortcutRepository>) -> Self {
        Self {
            invalidation: CacheInvalidation::subscribe(registry),
            shortcuts,
        }
    }
}

impl CorpusRanker for DefaultCorpusRanker {
    fn ranked_corpora(&self) -> Vec<Arc<Corpus>> {
        self.invalidation.get_or_compute(|| {
            let scores = self.shortcuts.corpus_scores();
            let mut corpora = self.invalidation.registry.enabled_corpora();
            corpora.sort_by(|a, b| compare_corpora(a, b, &scores));
            tracing::debug!(
                ranked = ?corpora.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "corpus ranking recomputed"
            );
            corpora
        })
    }

    fn on_corpus_set_changed(&self) {
        self.invalidation.clear();
    }
}

fn corpus_score(corpus: &Corpus, scores: &HashMap<String, i64>) -> i64 {
    if corpus.is_web {
        return i64::MAX;
    }
    scores.get(&corpus.name).copied().unwrap_or(0)
}

fn compare_corpora(a: &Corpus, b: &Corpus, scores: &HashMap<String, i64>) -> Ordering {
    b.default_enabled
        .cmp(&a.default_enabled)
        .then_with(|| corpus_score(b, scores).cmp(&corpus_score(a, scores)))
        .then_with(|| a.name.cmp(&b.name))
}

/// Ranks enabled corpora by name. Deterministic, used for testing.
pub struct LexicographicalCorpusRanker {
    invalidation: CacheInvalidation,
}

impl LexicographicalCorpusRanker {
    /// Creates a ranker over the registry's enabled corpora.
    pub fn new(registry: Arc<CorpusRegistry>) -> Self {
        Self {
            invalidation: CacheInvalidation::subscribe(registry),
        }
    }
}

impl CorpusRanker for LexicographicalCorpusRanker {
    fn ranked_corpora(&self) -> Vec<Arc<Corpus>> {
        self.invalidation.get_or_compute(|| {
            let mut corpora = self.invalidation.registry.enabled_corpora();
            corpora.sort_by(|a, b| a.name.cmp(&b.name));
            corpora
        })
    }

    fn on_corpus_set_changed(&self) {
        self.invalidation.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcuts::ShortcutCursor;
    use crate::suggestions::Suggestions;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[derive(Default)]
    struct ScoreRepository {
        scores: Mutex<HashMap<String, i64>>,
        score_reads: AtomicUsize,
    }

    impl ScoreRepository {
        fn with_scores(scores: &[(&str, i64)]) -> Self {
            Self {
                scores: Mutex::new(
                    scores
                        .iter()
                        .map(|(name, score)| ((*name).to_owned(), *score))
                        .collect(),
                ),
                score_reads: AtomicUsize::new(0),
            }
        }
    }

    impl ShortcutRepository for ScoreRepository {
        fn shortcuts_for_query(&self, query: &str, _allowed: &[Arc<Corpus>]) -> ShortcutCursor {
            ShortcutCursor::new(query, Vec::new())
        }

        fn corpus_scores(&self) -> HashMap<String, i64> {
            self.score_reads.fetch_add(1, AtomicOrdering::SeqCst);
            self.scores.lock().unwrap().clone()
        }

        fn report_click(&self, _suggestions: &Suggestions, _position: usize) {}

        fn has_history(&self) -> bool {
            false
        }

        fn clear_history(&self) {}
    }

    fn names(corpora: &[Arc<Corpus>]) -> Vec<&str> {
        corpora.iter().map(|c| c.name.as_str()).collect()
    }

    fn registry(corpora: Vec<Corpus>) -> Arc<CorpusRegistry> {
        let registry = Arc::new(CorpusRegistry::new());
        for corpus in corpora {
            let name = corpus.name.clone();
            registry.add_corpus(Arc::new(corpus));
            registry.set_enabled(&name, true).expect("registered");
        }
        registry
    }

    #[test]
    fn default_corpora_rank_before_higher_scored_others() {
        let registry = registry(vec![
            Corpus::new("other_c", vec![]),
            Corpus::new("default_b", vec![]).default_enabled(),
            Corpus::new("default_a", vec![]).default_enabled(),
        ]);
        let repo = Arc::new(ScoreRepository::with_scores(&[
            ("default_a", 5),
            ("default_b", 2),
            ("other_c", 10),
        ]));
        let ranker = DefaultCorpusRanker::new(registry, repo);
        assert_eq!(
            names(&ranker.ranked_corpora()),
            vec!["default_a", "default_b", "other_c"]
        );
    }

    #[test]
    fn web_corpus_first_within_its_tier() {
        let registry = registry(vec![
            Corpus::new("apps", vec![]).default_enabled(),
            Corpus::new("web", vec![]).web().default_enabled(),
            Corpus::new("music", vec![]),
        ]);
        let repo = Arc::new(ScoreRepository::with_scores(&[("apps", 1_000)]));
        let ranker = DefaultCorpusRanker::new(registry, repo);
        assert_eq!(names(&ranker.ranked_corpora()), vec!["web", "apps", "music"]);
    }

    #[test]
    fn missing_scores_count_as_zero_and_ties_break_on_name() {
        let registry = registry(vec![
            Corpus::new("zeta", vec![]),
            Corpus::new("alpha", vec![]),
            Corpus::new("beta", vec![]),
        ]);
        let repo = Arc::new(ScoreRepository::with_scores(&[("zeta", 1)]));
        let ranker = DefaultCorpusRanker::new(registry, repo);
        assert_eq!(names(&ranker.ranked_corpora()), vec!["zeta", "alpha", "beta"]);
    }

    #[test]
    fn disabled_corpora_are_excluded() {
        let registry = registry(vec![
            Corpus::new("apps", vec![]).default_enabled(),
            Corpus::new("music", vec![]),
        ]);
        registry.set_enabled("music", false).expect("registered");
        let ranker = DefaultCorpusRanker::new(registry, Arc::new(ScoreRepository::default()));
        assert_eq!(names(&ranker.ranked_corpora()), vec!["apps"]);
    }

    #[test]
    fn order_is_cached_until_corpus_set_changes() {
        let registry = registry(vec![Corpus::new("apps", vec![]).default_enabled()]);
        let repo = Arc::new(ScoreRepository::default());
        let ranker = DefaultCorpusRanker::new(Arc::clone(&registry), repo.clone());

        let _ = ranker.ranked_corpora();
        let _ = ranker.ranked_corpora();
        assert_eq!(repo.score_reads.load(AtomicOrdering::SeqCst), 1);

        registry.add_corpus(Arc::new(Corpus::new("web", vec![]).web().default_enabled()));
        assert_eq!(names(&ranker.ranked_corpora()), vec!["web", "apps"]);
        assert_eq!(repo.score_reads.load(AtomicOrdering::SeqCst), 2);

        ranker.on_corpus_set_changed();
        let _ = ranker.ranked_corpora();
        assert_eq!(repo.score_reads.load(AtomicOrdering::SeqCst), 3);
    }

    #[test]
    fn dropping_ranker_unsubscribes() {
        let registry = registry(vec![Corpus::new("apps", vec![])]);
        let ranker = LexicographicalCorpusRanker::new(Arc::clone(&registry));
        assert_eq!(registry.observer_count(), 1);
        drop(ranker);
        assert_eq!(registry.observer_count(), 0);
    }

    #[test]
    fn lexicographical_ranker_sorts_by_name() {
        let registry = registry(vec![
            Corpus::new("web", vec![]).web(),
            Corpus::new("apps", vec![]),
        ]);
        let ranker = LexicographicalCorpusRanker::new(registry);
        assert_eq!(names(&ranker.ranked_corpora()), vec!["apps", "web"]);
    }
}
