//! Trait definition for pluggable suggestion sources.
//!
//! A [`Source`] is one physical suggestion provider (an app index, a contacts
//! provider, a web suggest endpoint). Sources are queried from the worker
//! pool, may be slow, and may fail; the coordinator bounds each call with the
//! configured timeout and turns failures into empty results.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{SourceId, SuggestionRow};

/// Hook run once when the resources behind a result are released.
pub type ReleaseHook = Box<dyn FnOnce() + Send>;

/// The ordered rows one source produced for a query.
///
/// A result may own an underlying resource (a database cursor, a pooled
/// buffer). Its release hook runs exactly once: when the rows are handed
/// to a [`CorpusResult`](crate::CorpusResult), that result takes over the
/// hook; otherwise it runs on drop.
pub struct SourceResult {
    rows: Vec<SuggestionRow>,
    release: Option<ReleaseHook>,
}

impl SourceResult {
    /// Creates a result with no underlying resource.
    pub fn new(rows: Vec<SuggestionRow>) -> Self {
        Self {
            rows,
            release: None,
        }
    }

    /// A result with no rows.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Attaches a hook that runs when this result is released.
    #[must_use]
    pub fn with_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    /// The rows, in source order.
    pub fn rows(&self) -> &[SuggestionRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the source found nothing.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Splits the result into its rows and release hook.
    pub(crate) fn into_parts(mut self) -> (Vec<SuggestionRow>, Option<ReleaseHook>) {
        (std::mem::take(&mut self.rows), self.release.take())
    }
}

impl Drop for SourceResult {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for SourceResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResult")
            .field("rows", &self.rows.len())
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

/// Outcome of refreshing a shortcut against its source.
#[derive(Debug, Clone, PartialEq)]
pub enum ShortcutRefresh {
    /// The source has nothing newer; keep the stored row.
    Unchanged,
    /// The source produced fresh data for the shortcut.
    Updated(SuggestionRow),
    /// The shortcut no longer resolves and should be dropped.
    Invalid,
}

/// A pluggable suggestion provider.
///
/// All implementations must be `Send + Sync`: the same source is queried from
/// many worker tasks over its lifetime.
#[async_trait]
pub trait Source: Send + Sync {
    /// Identity of this source, copied into every row it produces.
    fn id(&self) -> &SourceId;

    /// Unique source name.
    fn name(&self) -> &str {
        &self.id().name
    }

    /// Whether this source provides web search suggestions.
    fn is_web_suggestion_source(&self) -> bool {
        self.id().is_web
    }

    /// Query the source for up to `max_results` rows.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError`](crate::SuggestError) if the source cannot
    /// answer. Callers treat an error exactly like an empty result.
    async fn query_for_suggestions(&self, query: &str, max_results: usize) -> Result<SourceResult>;

    /// Re-validate a row previously shown as a shortcut.
    ///
    /// The default keeps the stored row.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails; the stored row is kept.
    async fn refresh_shortcut(&self, shortcut_id: &str) -> Result<ShortcutRefresh> {
        let _ = shortcut_id;
        Ok(ShortcutRefresh::Unchanged)
    }
}
