//! Concatenation: every corpus' rows in corpus order.

use crate::corpus::CorpusResult;

use super::promoted::PromotedList;

/// Appends live rows corpus by corpus until `max` rows were added.
/// Shortcuts are ignored.
pub(super) fn pick(results: &[CorpusResult], max: usize, promoted: &mut PromotedList) {
    let mut added = 0;
    for row in results.iter().flat_map(|r| r.rows()) {
        if added >= max {
            return;
        }
        if promoted.add(row.clone()) {
            added += 1;
        }
    }
}
