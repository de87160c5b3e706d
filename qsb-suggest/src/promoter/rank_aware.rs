//! Rank-aware promotion.
//!
//! Default-enabled corpora get the slots visible above the keyboard,
//! shared evenly. Remaining budget goes to the rest of the default
//! corpora, then to the other corpora. Each group is filled by striping:
//! one even round, then a single round where the first lanes that still
//! have rows take whatever budget is left.

use crate::corpus::CorpusResult;
use crate::types::SuggestionRow;

use super::promoted::PromotedList;

/// One corpus' rows with a read position that survives between passes.
struct Lane<'a> {
    rows: &'a [SuggestionRow],
    pos: usize,
}

impl<'a> Lane<'a> {
    fn next_row(&mut self) -> Option<&'a SuggestionRow> {
        let row = self.rows.get(self.pos)?;
        self.pos += 1;
        Some(row)
    }

    fn is_exhausted(&self) -> bool {
        self.pos >= self.rows.len()
    }
}

pub(super) fn pick(
    slots_above_keyboard: usize,
    results: &[CorpusResult],
    max: usize,
    promoted: &mut PromotedList,
) {
    let (defaults, others): (Vec<&CorpusResult>, Vec<&CorpusResult>) = results
        .iter()
        .filter(|r| !r.is_empty())
        .partition(|r| r.corpus().default_enabled);
    let mut default_lanes = lanes(&defaults);
    let mut other_lanes = lanes(&others);

    let mut remaining = max;

    if remaining > 0 && !default_lanes.is_empty() {
        let reserved = slots_above_keyboard
            .saturating_sub(promoted.len())
            .min(remaining);
        if reserved > 0 {
            let stripe = (reserved / default_lanes.len()).max(1);
            remaining -= stripe_pass(&mut default_lanes, reserved, stripe, promoted);
        }
    }

    remaining = fill(&mut default_lanes, remaining, promoted);
    fill(&mut other_lanes, remaining, promoted);
}

fn lanes<'a>(results: &[&'a CorpusResult]) -> Vec<Lane<'a>> {
    results
        .iter()
        .map(|r| Lane {
            rows: r.rows(),
            pos: 0,
        })
        .collect()
}

/// Even stripe round, then one leftover round with a stripe as wide as the
/// budget left. Returns the budget left.
fn fill(lanes: &mut Vec<Lane<'_>>, mut remaining: usize, promoted: &mut PromotedList) -> usize {
    if remaining == 0 || lanes.is_empty() {
        return remaining;
    }
    let stripe = (remaining / lanes.len()).max(1);
    remaining -= stripe_pass(lanes, remaining, stripe, promoted);
    if remaining > 0 && !lanes.is_empty() {
        remaining -= stripe_pass(lanes, remaining, remaining, promoted);
    }
    remaining
}

/// Takes up to `stripe` rows from each lane in order, adding at most
/// `budget` rows overall. Exhausted lanes are dropped. Returns the number
/// of rows added.
fn stripe_pass(
    lanes: &mut Vec<Lane<'_>>,
    budget: usize,
    stripe: usize,
    promoted: &mut PromotedList,
) -> usize {
    let mut added = 0;
    for lane in lanes.iter_mut() {
        if added >= budget {
            break;
        }
        let mut taken = 0;
        while taken < stripe && added < budget {
            let Some(row) = lane.next_row() else {
                break;
            };
            if promoted.add(row.clone()) {
                taken += 1;
                added += 1;
            }
        }
    }
    lanes.retain(|lane| !lane.is_exhausted());
    added
}
