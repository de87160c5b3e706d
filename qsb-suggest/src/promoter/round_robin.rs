//! Round robin: one row from each corpus in turn.

use crate::corpus::CorpusResult;

use super::promoted::PromotedList;

pub(super) fn pick(results: &[CorpusResult], max: usize, promoted: &mut PromotedList) {
    let mut lanes: Vec<_> = results
        .iter()
        .filter(|r| !r.is_empty())
        .map(|r| r.rows().iter())
        .collect();
    let mut added = 0;
    while added < max && !lanes.is_empty() {
        lanes.retain_mut(|lane| {
            if added >= max {
                return true;
            }
            match lane.next() {
                Some(row) => {
                    if promoted.add(row.clone()) {
                        added += 1;
                    }
                    true
                }
                None => false,
            }
        });
    }
}
