//! Click-history shortcuts.
//!
//! The [`ShortcutRepository`] is an external dependency: it remembers what
//! the user clicked and hands back a [`ShortcutCursor`] of previously
//! clicked rows for a new query. It also provides the click scores the
//! default corpus ranker orders by.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::corpus::Corpus;
use crate::source::{ReleaseHook, ShortcutRefresh};
use crate::suggestions::Suggestions;
use crate::types::{SourceId, SuggestionRow};

/// Persistent click history.
///
/// Implementations must be thread-safe; the coordinator reads shortcuts
/// from the caller's thread and reports refreshes from the publish task.
pub trait ShortcutRepository: Send + Sync {
    /// Previously clicked rows relevant to `query`, restricted to corpora
    /// in `allowed`.
    fn shortcuts_for_query(&self, query: &str, allowed: &[Arc<Corpus>]) -> ShortcutCursor;

    /// Click score per corpus name. Corpora missing from the map score 0.
    fn corpus_scores(&self) -> HashMap<String, i64>;

    /// Records a click on the promoted row at `position`.
    fn report_click(&self, suggestions: &Suggestions, position: usize);

    /// Whether any click has been recorded.
    fn has_history(&self) -> bool;

    /// Forgets every recorded click.
    fn clear_history(&self);

    /// Stores the outcome of a shortcut refresh. `refreshed` is `None` when
    /// the shortcut no longer resolves.
    fn update_shortcut(
        &self,
        source: &SourceId,
        shortcut_id: &str,
        refreshed: Option<&SuggestionRow>,
    ) {
        let _ = (source, shortcut_id, refreshed);
    }
}

/// Shortcut rows for one query.
///
/// Like a [`CorpusResult`](crate::CorpusResult), the cursor may own a
/// resource that is released exactly once, on [`close`](Self::close) or
/// drop.
pub struct ShortcutCursor {
    query: String,
    rows: Vec<SuggestionRow>,
    refresh_requested: HashSet<(SourceId, String)>,
    release: Option<ReleaseHook>,
    closed: bool,
}

impl ShortcutCursor {
    /// Creates a cursor over `rows`, marking each of them as a shortcut.
    pub fn new(query: impl Into<String>, rows: Vec<SuggestionRow>) -> Self {
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.is_shortcut = true;
                row
            })
            .collect();
        Self {
            query: query.into(),
            rows,
            refresh_requested: HashSet::new(),
            release: None,
            closed: false,
        }
    }

    /// Attaches a hook that runs when the cursor is released.
    #[must_use]
    pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    /// The query these shortcuts were fetched for.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The shortcut rows, most relevant first.
    pub fn rows(&self) -> &[SuggestionRow] {
        &self.rows
    }

    /// Number of shortcuts.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no shortcuts.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `row` has a shortcut id that has not been refreshed yet.
    pub(crate) fn needs_refresh(&self, row: &SuggestionRow) -> bool {
        match &row.shortcut_id {
            Some(id) => !self
                .refresh_requested
                .contains(&(row.source.clone(), id.clone())),
            None => false,
        }
    }

    /// Marks a shortcut as scheduled for refresh. Returns false if it
    /// already was.
    pub(crate) fn mark_refresh_requested(&mut self, source: &SourceId, shortcut_id: &str) -> bool {
        self.refresh_requested
            .insert((source.clone(), shortcut_id.to_owned()))
    }

    /// Applies a refresh outcome. Returns whether the rows changed.
    pub(crate) fn apply_refresh(
        &mut self,
        source: &SourceId,
        shortcut_id: &str,
        outcome: &ShortcutRefresh,
    ) -> bool {
        let Some(index) = self
            .rows
            .iter()
            .position(|r| &r.source == source && r.shortcut_id.as_deref() == Some(shortcut_id))
        else {
            return false;
        };
        match outcome {
            ShortcutRefresh::Unchanged => false,
            ShortcutRefresh::Updated(row) => {
                let mut row = row.clone();
                row.is_shortcut = true;
                row.shortcut_id = Some(shortcut_id.to_owned());
                if row.corpus.is_none() {
                    row.corpus = self.rows[index].corpus.clone();
                }
                if self.rows[index] == row {
                    return false;
                }
                self.rows[index] = row;
                true
            }
            ShortcutRefresh::Invalid => {
                self.rows.remove(index);
                true
            }
        }
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Releases the underlying resource. Later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ShortcutCursor {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ShortcutCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortcutCursor")
            .field("query", &self.query)
            .field("rows", &self.rows.len())
            .field("closed", &self.closed)
            .finish()
    }
}
