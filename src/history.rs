//! In-memory click history.
//!
//! Every click is stored as one [`ClickRecord`]. Shortcuts and corpus scores
//! are derived from the records on demand. The records can be saved to and
//! loaded from a JSON file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use qsb_suggest::{Corpus, ShortcutCursor, ShortcutRepository, SourceId, SuggestionRow, Suggestions};
use serde::{Deserialize, Serialize};

use crate::config::HistoryConfig;
use crate::error::{QsbError, Result};

/// One recorded click.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickRecord {
    /// The query typed when the row was clicked.
    pub query: String,
    /// Corpus the row came from.
    pub corpus: String,
    /// The clicked row.
    pub row: SuggestionRow,
    /// Click time.
    pub clicked_at: DateTime<Utc>,
}

impl ClickRecord {
    fn key(&self) -> String {
        match &self.row.shortcut_id {
            Some(id) => format!("{}#{}", self.row.source.name, id),
            None => self.row.intent_key(),
        }
    }
}

/// [`ShortcutRepository`] keeping clicks in memory.
pub struct InMemoryShortcutRepository {
    max_stat_age: Duration,
    min_clicks_for_corpus_ranking: usize,
    clicks: Mutex<Vec<ClickRecord>>,
}

impl InMemoryShortcutRepository {
    /// Creates an empty history.
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            max_stat_age: config.max_stat_age(),
            min_clicks_for_corpus_ranking: config.min_clicks_for_corpus_ranking,
            clicks: Mutex::new(Vec::new()),
        }
    }

    fn clicks(&self) -> MutexGuard<'_, Vec<ClickRecord>> {
        self.clicks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a click on `row` for `query` at the given time.
    pub fn record_click(&self, query: &str, row: &SuggestionRow, clicked_at: DateTime<Utc>) {
        let corpus = row
            .corpus
            .clone()
            .unwrap_or_else(|| row.source.name.clone());
        let mut row = row.clone();
        row.is_shortcut = false;
        tracing::debug!(corpus = %corpus, source = %row.source, "click recorded");
        self.clicks().push(ClickRecord {
            query: query.to_owned(),
            corpus,
            row,
            clicked_at,
        });
    }

    /// Number of recorded clicks.
    pub fn click_count(&self) -> usize {
        self.clicks().len()
    }

    fn is_recent(&self, record: &ClickRecord, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.max_stat_age) {
            Ok(max_age) => now.signed_duration_since(record.clicked_at) <= max_age,
            Err(_) => true,
        }
    }

    /// Corpus scores as of `now`.
    pub fn corpus_scores_at(&self, now: DateTime<Utc>) -> HashMap<String, i64> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for record in self.clicks().iter().filter(|r| self.is_recent(r, now)) {
            *counts.entry(record.corpus.clone()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, clicks)| *clicks >= self.min_clicks_for_corpus_ranking)
            .map(|(corpus, clicks)| (corpus, i64::try_from(clicks).unwrap_or(i64::MAX)))
            .collect()
    }

    /// Replaces the history with the records in a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(&self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<ClickRecord> = serde_json::from_str(&content)
            .map_err(|e| QsbError::History(format!("{}: {e}", path.display())))?;
        let count = records.len();
        *self.clicks() = records;
        tracing::info!(path = %path.display(), clicks = count, "click history loaded");
        Ok(count)
    }

    /// Writes the history to a JSON file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&*self.clicks())?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "click history saved");
        Ok(())
    }
}

struct Aggregate {
    row: SuggestionRow,
    clicks: usize,
    last_click: DateTime<Utc>,
}

impl ShortcutRepository for InMemoryShortcutRepository {
    fn shortcuts_for_query(&self, query: &str, allowed: &[Arc<Corpus>]) -> ShortcutCursor {
        let mut order: Vec<String> = Vec::new();
        let mut by_key: HashMap<String, Aggregate> = HashMap::new();
        for record in self.clicks().iter() {
            if !record.query.starts_with(query) {
                continue;
            }
            if !allowed.iter().any(|c| c.name == record.corpus) {
                continue;
            }
            let key = record.key();
            match by_key.get_mut(&key) {
                Some(agg) => {
                    agg.clicks += 1;
                    if record.clicked_at >= agg.last_click {
                        agg.last_click = record.clicked_at;
                        agg.row = record.row.clone();
                    }
                }
                None => {
                    order.push(key.clone());
                    let mut row = record.row.clone();
                    row.corpus = Some(record.corpus.clone());
                    by_key.insert(
                        key,
                        Aggregate {
                            row,
                            clicks: 1,
                            last_click: record.clicked_at,
                        },
                    );
                }
            }
        }

        let mut aggregates: Vec<Aggregate> =
            order.iter().filter_map(|k| by_key.remove(k)).collect();
        aggregates.sort_by(|a, b| {
            b.clicks
                .cmp(&a.clicks)
                .then_with(|| b.last_click.cmp(&a.last_click))
        });
        let rows = aggregates.into_iter().map(|a| a.row).collect();
        ShortcutCursor::new(query, rows)
    }

    fn corpus_scores(&self) -> HashMap<String, i64> {
        self.corpus_scores_at(Utc::now())
    }

    fn report_click(&self, suggestions: &Suggestions, position: usize) {
        let rows = suggestions.visible_rows();
        match rows.get(position) {
            Some(row) => self.record_click(suggestions.query(), row, Utc::now()),
            None => tracing::warn!(
                position,
                shown = rows.len(),
                "click position outside the shown suggestions"
            ),
        }
    }

    fn has_history(&self) -> bool {
        !self.clicks().is_empty()
    }

    fn clear_history(&self) {
        self.clicks().clear();
        tracing::info!("click history cleared");
    }

    fn update_shortcut(&self, source: &SourceId, shortcut_id: &str, refreshed: Option<&SuggestionRow>) {
        let mut clicks = self.clicks();
        let matches = |r: &ClickRecord| {
            &r.row.source == source && r.row.shortcut_id.as_deref() == Some(shortcut_id)
        };
        match refreshed {
            Some(row) => {
                for record in clicks.iter_mut().filter(|r| matches(r)) {
                    let mut row = row.clone();
                    row.shortcut_id = Some(shortcut_id.to_owned());
                    row.is_shortcut = false;
                    row.corpus = record.row.corpus.clone();
                    record.row = row;
                }
            }
            None => {
                let before = clicks.len();
                clicks.retain(|r| !matches(r));
                tracing::debug!(
                    source = %source,
                    removed = before - clicks.len(),
                    "invalid shortcut removed from history"
                );
            }
        }
    }
}
