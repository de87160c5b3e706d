//! Static word-list source backing configured corpora.

use async_trait::async_trait;
use qsb_suggest::{IntentPayload, ShortcutRefresh, Source, SourceId, SourceResult, SuggestionRow};

/// Serves the configured words that start with the query.
///
/// Matching is case-insensitive. Every row carries its word as shortcut id,
/// so a clicked word stays valid exactly as long as it is still configured.
#[derive(Debug)]
pub struct WordListSource {
    id: SourceId,
    words: Vec<String>,
}

impl WordListSource {
    /// Creates a source named `name` over `words`.
    pub fn new(name: impl Into<String>, web: bool, words: Vec<String>) -> Self {
        let id = if web {
            SourceId::web(name)
        } else {
            SourceId::new(name)
        };
        Self { id, words }
    }

    fn row(&self, word: &str) -> SuggestionRow {
        let row = SuggestionRow::new(self.id.clone(), word).with_shortcut_id(word);
        if self.id.is_web {
            return row;
        }
        row.with_intent(IntentPayload {
            action: "view".to_owned(),
            data: Some(format!("{}/{}", self.id.name, word)),
            query: None,
            extra_data: None,
        })
    }
}

#[async_trait]
impl Source for WordListSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    async fn query_for_suggestions(
        &self,
        query: &str,
        max_results: usize,
    ) -> qsb_suggest::Result<SourceResult> {
        let needle = query.to_lowercase();
        let rows = self
            .words
            .iter()
            .filter(|w| w.to_lowercase().starts_with(&needle))
            .take(max_results)
            .map(|w| self.row(w))
            .collect();
        Ok(SourceResult::new(rows))
    }

    async fn refresh_shortcut(&self, shortcut_id: &str) -> qsb_suggest::Result<ShortcutRefresh> {
        Ok(match self.words.iter().find(|w| w.as_str() == shortcut_id) {
            Some(word) => ShortcutRefresh::Updated(self.row(word)),
            None => ShortcutRefresh::Invalid,
        })
    }
}
