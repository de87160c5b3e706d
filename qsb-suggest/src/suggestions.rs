//! The per-query suggestion session.
//!
//! A [`Suggestions`] collects the corpus results and shortcuts for one
//! query and lazily computes the promoted list from them. It is a cheap
//! cloneable handle: the coordinator's publish task adds results while the
//! UI side reads the promoted rows and observes changes.
//!
//! Lifecycle: a session is closed exactly once. Closing releases every
//! held [`CorpusResult`] and the shortcut cursor and drops all observers.
//! Results delivered after close are released immediately. A session
//! that a consumer has [claimed](Suggestions::claim) is closed by that
//! consumer; the coordinator only releases unclaimed ones.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::corpus::{Corpus, CorpusResult};
use crate::error::{Result, SuggestError};
use crate::observer::{Observer, ObserverList};
use crate::promoter::Promoter;
use crate::shortcuts::ShortcutCursor;
use crate::source::ShortcutRefresh;
use crate::types::{SourceId, SuggestionRow};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A shortcut the session wants re-validated against its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Source that produced the shortcut.
    pub source: SourceId,
    /// The shortcut's id.
    pub shortcut_id: String,
}

/// Receives refresh requests for promoted shortcuts.
pub(crate) type RefreshSink = Arc<dyn Fn(Suggestions, RefreshRequest) + Send + Sync>;

#[derive(Default)]
struct State {
    results: Vec<CorpusResult>,
    arrived: usize,
    shortcuts: Option<ShortcutCursor>,
    promoted: Option<Arc<[SuggestionRow]>>,
    corpus_filter: Option<Arc<Corpus>>,
    closed: bool,
}

struct Inner {
    id: u64,
    query: String,
    max_promoted: usize,
    expected: Vec<Arc<Corpus>>,
    promoter: Promoter,
    claimed: AtomicBool,
    observers: ObserverList,
    refresh_sink: Mutex<Option<RefreshSink>>,
    state: Mutex<State>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if !state.closed {
            tracing::warn!(
                session = self.id,
                results = state.results.len(),
                "suggestions dropped without close, releasing"
            );
            state.closed = true;
            for result in &mut state.results {
                result.close();
            }
            if let Some(cursor) = state.shortcuts.as_mut() {
                cursor.close();
            }
        }
    }
}

/// Handle to one query's suggestions.
#[derive(Clone)]
pub struct Suggestions {
    inner: Arc<Inner>,
}

impl Suggestions {
    /// Creates an open session expecting one result per corpus in
    /// `expected`.
    pub fn new(
        query: impl Into<String>,
        expected: Vec<Arc<Corpus>>,
        promoter: Promoter,
        max_promoted: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                query: query.into(),
                max_promoted,
                expected,
                promoter,
                claimed: AtomicBool::new(false),
                observers: ObserverList::new(),
                refresh_sink: Mutex::new(None),
                state: Mutex::new(State::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Process-unique session id, used in logs.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The query this session answers.
    pub fn query(&self) -> &str {
        &self.inner.query
    }

    /// Upper bound on the promoted list length.
    pub fn max_promoted(&self) -> usize {
        self.inner.max_promoted
    }

    /// The corpora this session waits for, in query order.
    pub fn expected_corpora(&self) -> &[Arc<Corpus>] {
        &self.inner.expected
    }

    /// Number of corpus results this session waits for.
    pub fn expected_result_count(&self) -> usize {
        self.inner.expected.len()
    }

    /// Number of corpus results published so far. 0 once closed.
    pub fn result_count(&self) -> usize {
        let state = self.state();
        if state.closed {
            0
        } else {
            state.arrived
        }
    }

    /// Whether every expected corpus has answered.
    pub fn is_done(&self) -> bool {
        self.state().arrived >= self.inner.expected.len()
    }

    /// Whether the session was closed.
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Takes over closing this session, e.g. for a view that keeps showing
    /// it after a newer query started. The coordinator then leaves it open
    /// when the query is superseded or the coordinator closes.
    pub fn claim(&self) {
        self.inner.claimed.store(true, Ordering::Release);
    }

    /// Whether a consumer has [claimed](Self::claim) the session.
    pub fn is_claimed(&self) -> bool {
        self.inner.claimed.load(Ordering::Acquire)
    }

    /// Corpora that have answered, in query order.
    pub fn included_corpora(&self) -> Vec<Arc<Corpus>> {
        self.state()
            .results
            .iter()
            .map(|r| Arc::clone(r.corpus()))
            .collect()
    }

    /// The rows of one corpus' result, if it has arrived.
    pub fn corpus_rows(&self, corpus: &str) -> Option<Vec<SuggestionRow>> {
        self.state()
            .results
            .iter()
            .find(|r| r.corpus().name == corpus)
            .map(|r| r.rows().to_vec())
    }

    /// The shortcut rows currently attached.
    pub fn shortcuts(&self) -> Vec<SuggestionRow> {
        self.state()
            .shortcuts
            .as_ref()
            .map(|c| c.rows().to_vec())
            .unwrap_or_default()
    }

    /// Restricts [`visible_rows`](Self::visible_rows) to one corpus, or
    /// back to the promoted list with `None`.
    pub fn filter_by_corpus(&self, corpus: Option<Arc<Corpus>>) {
        {
            let mut state = self.state();
            if state.closed {
                return;
            }
            state.corpus_filter = corpus;
        }
        self.inner.observers.notify_changed();
    }

    /// The corpus set by [`filter_by_corpus`](Self::filter_by_corpus).
    pub fn corpus_filter(&self) -> Option<Arc<Corpus>> {
        self.state().corpus_filter.clone()
    }

    /// What a list view should show: the filtered corpus' rows verbatim,
    /// or the promoted list.
    pub fn visible_rows(&self) -> Vec<SuggestionRow> {
        match self.corpus_filter() {
            Some(corpus) => self.corpus_rows(&corpus.name).unwrap_or_default(),
            None => self.promoted().to_vec(),
        }
    }

    /// The promoted rows, at most [`max_promoted`](Self::max_promoted).
    ///
    /// Computed on first use after every change and cached, so repeated
    /// calls without new results return the same rows. Promoted shortcuts
    /// not yet refreshed in this session are scheduled for refresh.
    pub fn promoted(&self) -> Arc<[SuggestionRow]> {
        let sink = self
            .inner
            .refresh_sink
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let (rows, requests) = {
            let mut state = self.state();
            if state.closed {
                return Arc::from(Vec::new());
            }
            if let Some(rows) = &state.promoted {
                return Arc::clone(rows);
            }

            let shortcut_rows = state
                .shortcuts
                .as_ref()
                .map(|c| c.rows())
                .unwrap_or_default();
            let rows: Arc<[SuggestionRow]> = self
                .inner
                .promoter
                .promote(shortcut_rows, &state.results, self.inner.max_promoted)
                .into();

            let mut requests = Vec::new();
            if sink.is_some() {
                if let Some(cursor) = state.shortcuts.as_mut() {
                    for row in rows.iter().filter(|r| r.is_shortcut) {
                        if !cursor.needs_refresh(row) {
                            continue;
                        }
                        if let Some(id) = &row.shortcut_id {
                            cursor.mark_refresh_requested(&row.source, id);
                            requests.push(RefreshRequest {
                                source: row.source.clone(),
                                shortcut_id: id.clone(),
                            });
                        }
                    }
                }
            }

            state.promoted = Some(Arc::clone(&rows));
            (rows, requests)
        };

        tracing::trace!(session = self.inner.id, promoted = rows.len(), "promoted list computed");
        if let Some(sink) = sink {
            for request in requests {
                sink(self.clone(), request);
            }
        }
        rows
    }

    /// Attaches the shortcuts for this query, releasing any previous cursor.
    pub fn set_shortcuts(&self, mut cursor: ShortcutCursor) {
        let previous = {
            let mut state = self.state();
            if state.closed {
                drop(state);
                cursor.close();
                return;
            }
            state.promoted = None;
            state.shortcuts.replace(cursor)
        };
        if let Some(mut previous) = previous {
            previous.close();
        }
        self.inner.observers.notify_changed();
    }

    /// Adds newly arrived corpus results and notifies observers.
    ///
    /// On a closed session the results are released and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::WrongQuery`] if a result answers a different
    /// query. That result is released; the others are still added.
    pub fn add_corpus_results(&self, results: Vec<CorpusResult>) -> Result<()> {
        if results.is_empty() {
            return Ok(());
        }
        let mut rejected = None;
        let added = {
            let mut state = self.state();
            if state.closed {
                drop(state);
                tracing::debug!(
                    session = self.inner.id,
                    count = results.len(),
                    "results arrived after close, releasing"
                );
                for mut result in results {
                    result.close();
                }
                return Ok(());
            }
            let mut added = 0;
            for mut result in results {
                if result.user_query() != self.inner.query {
                    tracing::error!(
                        session = self.inner.id,
                        corpus = %result.corpus().name,
                        "corpus result for wrong query"
                    );
                    if rejected.is_none() {
                        rejected = Some(SuggestError::WrongQuery {
                            expected: self.inner.query.clone(),
                            actual: result.user_query().to_owned(),
                        });
                    }
                    result.close();
                    continue;
                }
                let rank = self.rank_of(result.corpus());
                let at = state
                    .results
                    .partition_point(|r| self.rank_of(r.corpus()) <= rank);
                state.results.insert(at, result);
                state.arrived += 1;
                added += 1;
            }
            if added > 0 {
                state.promoted = None;
            }
            added
        };
        if added > 0 {
            self.inner.observers.notify_changed();
        }
        rejected.map_or(Ok(()), Err)
    }

    /// Position of `corpus` in the expected (ranked) corpora. Unexpected
    /// corpora sort last.
    fn rank_of(&self, corpus: &Arc<Corpus>) -> usize {
        self.inner
            .expected
            .iter()
            .position(|c| Arc::ptr_eq(c, corpus) || c.name == corpus.name)
            .unwrap_or(usize::MAX)
    }

    /// Applies a shortcut refresh outcome. Returns whether anything changed.
    pub(crate) fn apply_shortcut_refresh(
        &self,
        request: &RefreshRequest,
        outcome: &ShortcutRefresh,
    ) -> bool {
        let changed = {
            let mut state = self.state();
            if state.closed {
                return false;
            }
            let changed = state
                .shortcuts
                .as_mut()
                .is_some_and(|c| c.apply_refresh(&request.source, &request.shortcut_id, outcome));
            if changed {
                state.promoted = None;
            }
            changed
        };
        if changed {
            self.inner.observers.notify_changed();
        }
        changed
    }

    pub(crate) fn set_refresh_sink(&self, sink: RefreshSink) {
        *self
            .inner
            .refresh_sink
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(sink);
    }

    /// Registers an observer notified after every change.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::Lifecycle`] if the session is closed.
    pub fn register_observer(&self, observer: Arc<dyn Observer>) -> Result<()> {
        if self.is_closed() {
            tracing::error!(session = self.inner.id, "observer registered on closed suggestions");
            return Err(SuggestError::Lifecycle(format!(
                "suggestions {} already closed",
                self.inner.id
            )));
        }
        self.inner.observers.register(observer);
        Ok(())
    }

    /// Unregisters an observer.
    pub fn unregister_observer(&self, observer: &Arc<dyn Observer>) {
        self.inner.observers.unregister(observer);
    }

    /// Closes the session, releasing every held result.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::Lifecycle`] if the session was already closed.
    pub fn close(&self) -> Result<()> {
        if self.close_once() {
            Ok(())
        } else {
            tracing::error!(session = self.inner.id, "suggestions closed twice");
            Err(SuggestError::Lifecycle(format!(
                "suggestions {} closed twice",
                self.inner.id
            )))
        }
    }

    /// Closes the session if it is still open. Returns whether this call
    /// closed it.
    pub fn release(&self) -> bool {
        self.close_once()
    }

    fn close_once(&self) -> bool {
        let (results, shortcuts) = {
            let mut state = self.state();
            if state.closed {
                return false;
            }
            state.closed = true;
            state.promoted = None;
            (std::mem::take(&mut state.results), state.shortcuts.take())
        };
        tracing::debug!(session = self.inner.id, query = %self.inner.query, "suggestions closed");
        self.inner.observers.unregister_all();
        for mut result in results {
            result.close();
        }
        if let Some(mut cursor) = shortcuts {
            cursor.close();
        }
        true
    }

    /// Whether both handles refer to the same session.
    pub fn ptr_eq(&self, other: &Suggestions) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Suggestions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Suggestions")
            .field("id", &self.inner.id)
            .field("query", &self.inner.query)
            .field("expected", &self.inner.expected.len())
            .field("arrived", &state.arrived)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ReleaseHook;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn corpus(name: &str) -> Arc<Corpus> {
        Arc::new(Corpus::new(name, vec![]).default_enabled())
    }

    fn result(corpus: &Arc<Corpus>, query: &str, texts: &[&str]) -> CorpusResult {
        let rows = texts
            .iter()
            .map(|t| SuggestionRow::new(SourceId::new(corpus.name.clone()), *t))
            .collect();
        CorpusResult::new(Arc::clone(corpus), query, rows, Duration::ZERO)
    }

    fn released_result(
        corpus: &Arc<Corpus>,
        query: &str,
        released: &Arc<AtomicUsize>,
    ) -> CorpusResult {
        let counter = Arc::clone(released);
        let hook: ReleaseHook = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        CorpusResult::with_releases(
            Arc::clone(corpus),
            query,
            vec![SuggestionRow::new(SourceId::new("s"), "row")],
            Duration::ZERO,
            vec![hook],
        )
    }

    fn session(query: &str, expected: Vec<Arc<Corpus>>) -> Suggestions {
        Suggestions::new(query, expected, Promoter::Concat, 8)
    }

    fn texts(rows: &[SuggestionRow]) -> Vec<&str> {
        rows.iter().map(|r| r.text1.as_str()).collect()
    }

    #[test]
    fn done_once_every_expected_corpus_answered() {
        let (a, b) = (corpus("a"), corpus("b"));
        let s = session("q", vec![Arc::clone(&a), Arc::clone(&b)]);
        assert!(!s.is_done());
        s.add_corpus_results(vec![result(&a, "q", &["a1"])]).expect("add");
        assert!(!s.is_done());
        assert_eq!(s.result_count(), 1);
        s.add_corpus_results(vec![result(&b, "q", &[])]).expect("add");
        assert!(s.is_done());
        assert_eq!(s.included_corpora().len(), 2);
        s.close().expect("close");
    }

    #[test]
    fn session_without_corpora_is_done_immediately() {
        let s = session("q", vec![]);
        assert!(s.is_done());
        assert!(s.promoted().is_empty());
        s.close().expect("close");
    }

    #[test]
    fn promoted_is_cached_until_results_change() {
        let a = corpus("a");
        let s = session("q", vec![Arc::clone(&a)]);
        s.add_corpus_results(vec![result(&a, "q", &["a1", "a2"])]).expect("add");
        let first = s.promoted();
        let second = s.promoted();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(texts(&first), vec!["a1", "a2"]);
        s.close().expect("close");
    }

    #[test]
    fn promoted_respects_max() {
        let a = corpus("a");
        let s = Suggestions::new("q", vec![Arc::clone(&a)], Promoter::Concat, 2);
        s.add_corpus_results(vec![result(&a, "q", &["a1", "a2", "a3"])]).expect("add");
        assert_eq!(s.promoted().len(), 2);
        s.close().expect("close");
    }

    #[test]
    fn observers_notified_on_add() {
        let a = corpus("a");
        let s = session("q", vec![Arc::clone(&a)]);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let observed = s.clone();
        s.register_observer(Arc::new(move || {
            // Observers may read the session while being notified.
            let _ = observed.promoted();
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .expect("register");
        s.add_corpus_results(vec![result(&a, "q", &["a1"])]).expect("add");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        s.close().expect("close");
    }

    #[test]
    fn wrong_query_is_rejected_and_released() {
        let a = corpus("a");
        let s = session("q", vec![Arc::clone(&a)]);
        let released = Arc::new(AtomicUsize::new(0));
        let err = s
            .add_corpus_results(vec![released_result(&a, "other", &released)])
            .unwrap_err();
        assert!(matches!(err, SuggestError::WrongQuery { .. }));
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(s.result_count(), 0);
        s.close().expect("close");
    }

    #[test]
    fn close_releases_results_once() {
        let a = corpus("a");
        let s = session("q", vec![Arc::clone(&a)]);
        let released = Arc::new(AtomicUsize::new(0));
        s.add_corpus_results(vec![released_result(&a, "q", &released)])
            .expect("add");
        s.close().expect("close");
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(s.close().is_err());
        assert!(!s.release());
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(s.result_count(), 0);
        assert!(s.promoted().is_empty());
    }

    #[test]
    fn results_after_close_are_released() {
        let a = corpus("a");
        let s = session("q", vec![Arc::clone(&a)]);
        s.close().expect("close");
        let released = Arc::new(AtomicUsize::new(0));
        s.add_corpus_results(vec![released_result(&a, "q", &released)])
            .expect("ignored");
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observer_on_closed_session_rejected() {
        let s = session("q", vec![]);
        s.close().expect("close");
        let err = s.register_observer(Arc::new(|| {})).unwrap_err();
        assert!(matches!(err, SuggestError::Lifecycle(_)));
    }

    #[test]
    fn dropping_open_session_releases() {
        let a = corpus("a");
        let released = Arc::new(AtomicUsize::new(0));
        let s = session("q", vec![Arc::clone(&a)]);
        s.add_corpus_results(vec![released_result(&a, "q", &released)])
            .expect("add");
        drop(s);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn corpus_filter_shows_rows_verbatim() {
        let (a, b) = (corpus("a"), corpus("b"));
        let s = session("q", vec![Arc::clone(&a), Arc::clone(&b)]);
        s.add_corpus_results(vec![
            result(&a, "q", &["a1"]),
            result(&b, "q", &["b1", "b2"]),
        ])
        .expect("add");
        s.filter_by_corpus(Some(Arc::clone(&b)));
        assert_eq!(texts(&s.visible_rows()), vec!["b1", "b2"]);
        s.filter_by_corpus(None);
        assert_eq!(texts(&s.visible_rows()), vec!["a1", "b1", "b2"]);
        s.close().expect("close");
    }

    #[test]
    fn results_are_held_in_query_order_whatever_the_arrival_order() {
        let (a, b, c) = (corpus("a"), corpus("b"), corpus("c"));
        let s = session("q", vec![Arc::clone(&a), Arc::clone(&b), Arc::clone(&c)]);
        s.add_corpus_results(vec![result(&c, "q", &["c1"])]).expect("add");
        s.add_corpus_results(vec![result(&a, "q", &["a1"])]).expect("add");
        s.add_corpus_results(vec![result(&b, "q", &["b1"])]).expect("add");
        let names: Vec<_> = s.included_corpora().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(texts(&s.promoted()), vec!["a1", "b1", "c1"]);
        s.close().expect("close");
    }

    #[test]
    fn promoted_shortcuts_requested_for_refresh_once() {
        let a = corpus("a");
        let s = Suggestions::new("q", vec![Arc::clone(&a)], Promoter::single_corpus(), 8);
        let requests: Arc<Mutex<Vec<RefreshRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_requests = Arc::clone(&requests);
        s.set_refresh_sink(Arc::new(move |_s, request| {
            sink_requests.lock().unwrap().push(request);
        }));
        let row = SuggestionRow::new(SourceId::new("apps"), "Maps").with_shortcut_id("maps");
        s.set_shortcuts(ShortcutCursor::new("q", vec![row]));

        assert_eq!(texts(&s.promoted()), vec!["Maps"]);
        s.add_corpus_results(vec![result(&a, "q", &["a1"])]).expect("add");
        assert_eq!(texts(&s.promoted()), vec!["Maps", "a1"]);
        assert_eq!(requests.lock().unwrap().len(), 1);

        let request = requests.lock().unwrap()[0].clone();
        assert!(s.apply_shortcut_refresh(&request, &ShortcutRefresh::Invalid));
        assert_eq!(texts(&s.promoted()), vec!["a1"]);
        s.close().expect("close");
    }
}
