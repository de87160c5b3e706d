//! Caps shortcuts per source before delegating.

use std::collections::HashMap;

use crate::corpus::CorpusResult;
use crate::types::{SourceId, SuggestionRow};

use super::promoted::PromotedList;
use super::Promoter;

/// Keeps shortcuts in order while their source is under its cap.
pub(super) fn limit(
    shortcuts: &[SuggestionRow],
    max_per_web_source: usize,
    max_per_non_web_source: usize,
) -> Vec<SuggestionRow> {
    let mut per_source: HashMap<&SourceId, usize> = HashMap::new();
    let mut kept = Vec::with_capacity(shortcuts.len());
    for row in shortcuts {
        let cap = if row.source.is_web {
            max_per_web_source
        } else {
            max_per_non_web_source
        };
        let count = per_source.entry(&row.source).or_insert(0);
        if *count < cap {
            *count += 1;
            kept.push(row.clone());
        } else {
            tracing::trace!(source = %row.source, cap, "shortcut over per-source cap");
        }
    }
    kept
}

pub(super) fn pick(
    max_per_web_source: usize,
    max_per_non_web_source: usize,
    next: &Promoter,
    shortcuts: &[SuggestionRow],
    results: &[CorpusResult],
    max: usize,
    promoted: &mut PromotedList,
) {
    let limited = limit(shortcuts, max_per_web_source, max_per_non_web_source);
    next.pick_promoted(&limited, results, max, promoted);
}
