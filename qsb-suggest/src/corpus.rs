//! Corpora and the per-corpus outcome of one query.
//!
//! A [`Corpus`] is a user-visible suggestion category backed by one or more
//! [`Source`]s. Querying a corpus fans out to its sources, bounds each one by
//! the per-source timeout, and concatenates whatever came back into a single
//! [`CorpusResult`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::source::{ReleaseHook, Source};
use crate::types::SuggestionRow;

/// A named suggestion category.
///
/// Identity is the corpus name. Corpora are immutable once registered.
pub struct Corpus {
    /// Unique corpus name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Hint text shown when the corpus is selected.
    pub hint: Option<String>,
    /// Whether this is the web corpus.
    pub is_web: bool,
    /// Whether the corpus is enabled out of the box, which also ranks it
    /// ahead of corpora the user enabled manually.
    pub default_enabled: bool,
    /// Minimum query length, in characters, before this corpus is queried.
    pub query_threshold: usize,
    /// Keep querying this corpus after it returned nothing for a prefix
    /// of the current query.
    pub query_after_zero_results: bool,
    /// Query this corpus for the empty query. Only the web corpus does
    /// unless this is set.
    pub accepts_empty_query: bool,
    sources: Vec<Arc<dyn Source>>,
}

impl Corpus {
    /// Creates a non-web, non-default corpus over the given sources.
    pub fn new(name: impl Into<String>, sources: Vec<Arc<dyn Source>>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            hint: None,
            is_web: false,
            default_enabled: false,
            query_threshold: 0,
            query_after_zero_results: false,
            accepts_empty_query: false,
            sources,
        }
    }

    /// Marks this as the web corpus.
    #[must_use]
    pub fn web(mut self) -> Self {
        self.is_web = true;
        self
    }

    /// Marks this corpus as enabled by default.
    #[must_use]
    pub fn default_enabled(mut self) -> Self {
        self.default_enabled = true;
        self
    }

    /// Sets the display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the hint shown when the corpus is selected.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Sets the minimum query length.
    #[must_use]
    pub fn with_query_threshold(mut self, threshold: usize) -> Self {
        self.query_threshold = threshold;
        self
    }

    /// Keeps querying this corpus after zero results.
    #[must_use]
    pub fn query_after_zero_results(mut self) -> Self {
        self.query_after_zero_results = true;
        self
    }

    /// Opts this corpus into empty queries.
    #[must_use]
    pub fn accepts_empty_query(mut self) -> Self {
        self.accepts_empty_query = true;
        self
    }

    /// The sources backing this corpus.
    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    /// Query every backing source concurrently and merge the rows.
    ///
    /// Each source call is bounded by `timeout`. A failing or timed-out
    /// source contributes no rows; the others are unaffected. Rows keep
    /// source order, are tagged with this corpus' name and are capped at
    /// `max_results` overall.
    pub async fn query(
        self: &Arc<Self>,
        query: &str,
        max_results: usize,
        timeout: Duration,
    ) -> CorpusResult {
        let start = Instant::now();
        let futures: Vec<_> = self
            .sources
            .iter()
            .map(|source| async move {
                let outcome =
                    tokio::time::timeout(timeout, source.query_for_suggestions(query, max_results))
                        .await;
                (source, outcome)
            })
            .collect();

        let outcomes = futures::future::join_all(futures).await;

        let mut rows = Vec::new();
        let mut releases = Vec::new();
        for (source, outcome) in outcomes {
            match outcome {
                Ok(Ok(result)) => {
                    let (source_rows, release) = result.into_parts();
                    tracing::trace!(source = %source.name(), count = source_rows.len(), "source returned rows");
                    rows.extend(source_rows.into_iter().map(|mut row| {
                        row.corpus = Some(self.name.clone());
                        row
                    }));
                    releases.extend(release);
                }
                Ok(Err(err)) => {
                    tracing::warn!(corpus = %self.name, source = %source.name(), error = %err, "source query failed");
                }
                Err(_elapsed) => {
                    tracing::warn!(
                        corpus = %self.name,
                        source = %source.name(),
                        timeout_ms = timeout.as_millis() as u64,
                        "source query timed out"
                    );
                }
            }
        }

        rows.truncate(max_results);
        CorpusResult::with_releases(Arc::clone(self), query, rows, start.elapsed(), releases)
    }
}

impl PartialEq for Corpus {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Corpus {}

impl Hash for Corpus {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Corpus")
            .field("name", &self.name)
            .field("is_web", &self.is_web)
            .field("default_enabled", &self.default_enabled)
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl fmt::Display for Corpus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The rows one corpus produced for one query.
///
/// A result must be released exactly once to free whatever its sources
/// hold. [`close`](Self::close) releases explicitly; dropping an unclosed
/// result releases it as well, so a result can never leak or be released
/// twice.
pub struct CorpusResult {
    corpus: Arc<Corpus>,
    user_query: String,
    rows: Vec<SuggestionRow>,
    latency: Duration,
    releases: Vec<ReleaseHook>,
    closed: bool,
}

impl CorpusResult {
    /// Creates a result that holds no external resources.
    pub fn new(
        corpus: Arc<Corpus>,
        user_query: impl Into<String>,
        rows: Vec<SuggestionRow>,
        latency: Duration,
    ) -> Self {
        Self::with_releases(corpus, user_query, rows, latency, Vec::new())
    }

    pub(crate) fn with_releases(
        corpus: Arc<Corpus>,
        user_query: impl Into<String>,
        rows: Vec<SuggestionRow>,
        latency: Duration,
        releases: Vec<ReleaseHook>,
    ) -> Self {
        Self {
            corpus,
            user_query: user_query.into(),
            rows,
            latency,
            releases,
            closed: false,
        }
    }

    /// The corpus that produced this result.
    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// The query this result answers.
    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    /// The rows, in corpus order.
    pub fn rows(&self) -> &[SuggestionRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the corpus found nothing.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Time the corpus took to answer.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases the underlying resources. Later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for release in self.releases.drain(..) {
            release();
        }
    }
}

impl Drop for CorpusResult {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for CorpusResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorpusResult")
            .field("corpus", &self.corpus.name)
            .field("user_query", &self.user_query)
            .field("rows", &self.rows.len())
            .field("latency", &self.latency)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, SuggestError};
    use crate::source::SourceResult;
    use crate::types::SourceId;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        id: SourceId,
        words: Vec<&'static str>,
        delay: Duration,
        fail: bool,
        released: Arc<AtomicUsize>,
    }

    impl FixedSource {
        fn new(name: &str, words: Vec<&'static str>) -> Self {
            Self {
                id: SourceId::new(name),
                words,
                delay: Duration::ZERO,
                fail: false,
                released: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Source for FixedSource {
        fn id(&self) -> &SourceId {
            &self.id
        }

        async fn query_for_suggestions(
            &self,
            query: &str,
            max_results: usize,
        ) -> Result<SourceResult> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(SuggestError::Source("boom".into()));
            }
            let rows = self
                .words
                .iter()
                .filter(|w| w.starts_with(query))
                .take(max_results)
                .map(|w| SuggestionRow::new(self.id.clone(), *w))
                .collect();
            let released = Arc::clone(&self.released);
            Ok(SourceResult::new(rows).with_release(move || {
                released.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    #[tokio::test]
    async fn query_concatenates_sources_in_order() {
        let a: Arc<dyn Source> = Arc::new(FixedSource::new("a", vec!["rust", "ruby"]));
        let b: Arc<dyn Source> = Arc::new(FixedSource::new("b", vec!["rune"]));
        let corpus = Arc::new(Corpus::new("code", vec![a, b]));

        let result = corpus.query("ru", 10, Duration::from_secs(1)).await;
        let texts: Vec<_> = result.rows().iter().map(|r| r.text1.as_str()).collect();
        assert_eq!(texts, vec!["rust", "ruby", "rune"]);
        assert_eq!(result.user_query(), "ru");
        assert!(result
            .rows()
            .iter()
            .all(|r| r.corpus.as_deref() == Some("code")));
    }

    #[tokio::test]
    async fn merged_rows_capped_at_max_results() {
        let a: Arc<dyn Source> = Arc::new(FixedSource::new("a", vec!["rust", "ruby", "rune"]));
        let b: Arc<dyn Source> = Arc::new(FixedSource::new("b", vec!["rue", "rum", "run"]));
        let corpus = Arc::new(Corpus::new("code", vec![a, b]));

        let result = corpus.query("ru", 4, Duration::from_secs(1)).await;
        let texts: Vec<_> = result.rows().iter().map(|r| r.text1.as_str()).collect();
        assert_eq!(texts, vec!["rust", "ruby", "rune", "rue"]);
    }

    #[tokio::test]
    async fn failing_source_contributes_nothing() {
        let mut bad = FixedSource::new("bad", vec!["rust"]);
        bad.fail = true;
        let bad: Arc<dyn Source> = Arc::new(bad);
        let good: Arc<dyn Source> = Arc::new(FixedSource::new("good", vec!["rust"]));
        let corpus = Arc::new(Corpus::new("mixed", vec![bad, good]));

        let result = corpus.query("r", 10, Duration::from_secs(1)).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows()[0].source.name, "good");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out() {
        let mut slow = FixedSource::new("slow", vec!["rust"]);
        slow.delay = Duration::from_secs(30);
        let slow: Arc<dyn Source> = Arc::new(slow);
        let corpus = Arc::new(Corpus::new("slow", vec![slow]));

        let result = corpus.query("r", 10, Duration::from_millis(500)).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn close_releases_every_source_once() {
        let a = FixedSource::new("a", vec!["x"]);
        let b = FixedSource::new("b", vec!["x"]);
        let (ra, rb) = (Arc::clone(&a.released), Arc::clone(&b.released));
        let sources: Vec<Arc<dyn Source>> = vec![Arc::new(a), Arc::new(b)];
        let corpus = Arc::new(Corpus::new("c", sources));

        let mut result = corpus.query("x", 10, Duration::from_secs(1)).await;
        assert_eq!(ra.load(Ordering::SeqCst), 0);
        result.close();
        result.close();
        drop(result);
        assert_eq!(ra.load(Ordering::SeqCst), 1);
        assert_eq!(rb.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_unclosed_result_releases() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let corpus = Arc::new(Corpus::new("c", vec![]));
        let hook: ReleaseHook = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let result =
            CorpusResult::with_releases(corpus, "q", Vec::new(), Duration::ZERO, vec![hook]);
        drop(result);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn corpus_identity_is_name() {
        let a = Corpus::new("apps", vec![]).default_enabled();
        let b = Corpus::new("apps", vec![])
            .with_label("Applications")
            .with_hint("Search apps");
        assert_eq!(a, b);
        assert_eq!(a.hint, None);
        assert_eq!(b.hint.as_deref(), Some("Search apps"));
        assert_ne!(a, Corpus::new("web", vec![]).web());
    }
}
