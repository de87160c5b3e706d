//! Shortcuts first, then whatever the wrapped promoter picks.

use crate::corpus::CorpusResult;
use crate::types::SuggestionRow;

use super::promoted::PromotedList;
use super::Promoter;

pub(super) fn pick(
    next: Option<&Promoter>,
    shortcuts: &[SuggestionRow],
    results: &[CorpusResult],
    max: usize,
    promoted: &mut PromotedList,
) {
    let mut added = 0;
    for row in shortcuts {
        if added >= max {
            break;
        }
        if promoted.add(row.clone()) {
            added += 1;
        }
    }
    if let Some(next) = next {
        next.pick_promoted(shortcuts, results, max - added, promoted);
    }
}
