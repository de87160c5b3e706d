//! The de-duplicating output list the promoters append to.

use std::collections::HashSet;

use crate::types::SuggestionRow;

/// Promoted rows in display order, with duplicate suppression.
///
/// A row is rejected if an earlier row has the same shortcut id or leads
/// to the same destination (same [`SuggestionRow::intent_key`]). The first
/// occurrence wins, so shortcuts added first shadow live duplicates.
#[derive(Debug, Default, Clone)]
pub struct PromotedList {
    rows: Vec<SuggestionRow>,
    shortcut_ids: HashSet<String>,
    intents: HashSet<String>,
}

impl PromotedList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `row` unless it duplicates an earlier row. Returns whether
    /// it was added.
    pub fn add(&mut self, row: SuggestionRow) -> bool {
        if let Some(id) = &row.shortcut_id {
            if self.shortcut_ids.contains(id) {
                return false;
            }
        }
        let intent = row.intent_key();
        if self.intents.contains(&intent) {
            return false;
        }
        if let Some(id) = &row.shortcut_id {
            self.shortcut_ids.insert(id.clone());
        }
        self.intents.insert(intent);
        self.rows.push(row);
        true
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing has been promoted.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The promoted rows.
    pub fn rows(&self) -> &[SuggestionRow] {
        &self.rows
    }

    /// Consumes the list, returning the rows.
    pub fn into_rows(self) -> Vec<SuggestionRow> {
        self.rows
    }
}
