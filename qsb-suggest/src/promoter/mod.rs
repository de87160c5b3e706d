//! Promotion: choosing and ordering the rows the user actually sees.
//!
//! A [`Promoter`] is a small fixed set of strategies composed by wrapping.
//! Every strategy appends to a shared [`PromotedList`], which suppresses
//! duplicates, and never adds more than the budget it is given.
//!
//! | Strategy        | Picks                                                    |
//! |-----------------|----------------------------------------------------------|
//! | `Concat`        | live rows corpus after corpus                            |
//! | `RoundRobin`    | one live row from each corpus in turn                    |
//! | `RankAware`     | default corpora striped first, then the others           |
//! | `Shortcut`      | shortcuts, then the wrapped promoter with what is left   |
//! | `ShortcutLimit` | caps shortcuts per source, then the wrapped promoter     |

mod concat;
mod promoted;
mod rank_aware;
mod round_robin;
mod shortcut;
mod shortcut_limiting;

pub use promoted::PromotedList;

use crate::config::SuggestConfig;
use crate::corpus::CorpusResult;
use crate::types::SuggestionRow;

/// A promotion strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promoter {
    /// Live rows in corpus order. Ignores shortcuts.
    Concat,
    /// One live row per corpus per round. Ignores shortcuts.
    RoundRobin,
    /// Stripes default-enabled corpora over the first
    /// `slots_above_keyboard` positions, then fills the rest of the budget
    /// from default corpora and then from the others. Ignores shortcuts.
    RankAware {
        /// Positions visible without scrolling.
        slots_above_keyboard: usize,
    },
    /// Shortcuts first, then `next` (if any) with the remaining budget.
    Shortcut {
        /// Promoter for the live results.
        next: Option<Box<Promoter>>,
    },
    /// Drops shortcuts beyond a per-source cap, then delegates to `next`.
    ShortcutLimit {
        /// Cap for web suggestion sources.
        max_per_web_source: usize,
        /// Cap for every other source.
        max_per_non_web_source: usize,
        /// Promoter receiving the capped shortcuts.
        next: Box<Promoter>,
    },
}

impl Promoter {
    /// Promoter for the view that mixes all corpora:
    /// `ShortcutLimit(Shortcut(RankAware))`.
    pub fn all_corpora(config: &SuggestConfig) -> Self {
        Self::ShortcutLimit {
            max_per_web_source: config.max_shortcuts_per_web_source,
            max_per_non_web_source: config.max_shortcuts_per_non_web_source,
            next: Box::new(Self::Shortcut {
                next: Some(Box::new(Self::RankAware {
                    slots_above_keyboard: config.num_suggestions_above_keyboard,
                })),
            }),
        }
    }

    /// Promoter for a single-corpus view: `Shortcut(Concat)`.
    pub fn single_corpus() -> Self {
        Self::Shortcut {
            next: Some(Box::new(Self::Concat)),
        }
    }

    /// Appends at most `max` rows chosen from `shortcuts` and `results`
    /// to `promoted`.
    pub fn pick_promoted(
        &self,
        shortcuts: &[SuggestionRow],
        results: &[CorpusResult],
        max: usize,
        promoted: &mut PromotedList,
    ) {
        if max == 0 {
            return;
        }
        match self {
            Self::Concat => concat::pick(results, max, promoted),
            Self::RoundRobin => round_robin::pick(results, max, promoted),
            Self::RankAware {
                slots_above_keyboard,
            } => rank_aware::pick(*slots_above_keyboard, results, max, promoted),
            Self::Shortcut { next } => {
                shortcut::pick(next.as_deref(), shortcuts, results, max, promoted)
            }
            Self::ShortcutLimit {
                max_per_web_source,
                max_per_non_web_source,
                next,
            } => shortcut_limiting::pick(
                *max_per_web_source,
                *max_per_non_web_source,
                next,
                shortcuts,
                results,
                max,
                promoted,
            ),
        }
    }

    /// Runs the promoter into a fresh list and returns the rows.
    pub fn promote(
        &self,
        shortcuts: &[SuggestionRow],
        results: &[CorpusResult],
        max: usize,
    ) -> Vec<SuggestionRow> {
        let mut promoted = PromotedList::new();
        self.pick_promoted(shortcuts, results, max, &mut promoted);
        promoted.into_rows()
    }
}
