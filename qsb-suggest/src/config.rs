//! Suggestion engine tunables with the defaults the search box ships with.
//!
//! None of these values are contracts; they can all be overridden from the
//! host configuration file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SuggestError;

/// Tunables for the query coordinator and the promoter chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestConfig {
    /// Size of each follow-up batch of corpora, and the initial batch size
    /// when none of the queried corpora are enabled by default.
    pub num_promoted_sources: usize,
    /// Maximum number of suggestions shown in the "all corpora" view.
    pub max_promoted_suggestions: usize,
    /// Slots visible above the on-screen keyboard; the rank-aware promoter
    /// shares these evenly between default corpora first.
    pub num_suggestions_above_keyboard: usize,
    /// Number of rows requested from each source.
    pub max_results_per_source: usize,
    /// Shortcut cap per web suggestion source in the "all corpora" view.
    pub max_shortcuts_per_web_source: usize,
    /// Shortcut cap per non-web source in the "all corpora" view.
    pub max_shortcuts_per_non_web_source: usize,
    /// Per-source query timeout in milliseconds.
    pub source_timeout_ms: u64,
    /// Debounce applied to corpus results before they are published.
    /// A new arrival resets the timer. Zero publishes every result at once.
    pub publish_result_delay_ms: u64,
    /// Delay before a typed query is issued. A new keystroke resets it.
    pub typing_update_suggestions_delay_ms: u64,
    /// Size of the worker pool running source queries.
    pub query_threads: usize,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            num_promoted_sources: 3,
            max_promoted_suggestions: 8,
            num_suggestions_above_keyboard: 4,
            max_results_per_source: 50,
            max_shortcuts_per_web_source: 8,
            max_shortcuts_per_non_web_source: 2,
            source_timeout_ms: 10_000,
            publish_result_delay_ms: 200,
            typing_update_suggestions_delay_ms: 100,
            query_threads: 4,
        }
    }
}

impl SuggestConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `num_promoted_sources` must be greater than 0
    /// - `max_results_per_source` must be greater than 0
    /// - `source_timeout_ms` must be greater than 0
    /// - `query_threads` must be greater than 0
    pub fn validate(&self) -> Result<(), SuggestError> {
        if self.num_promoted_sources == 0 {
            return Err(SuggestError::Config(
                "num_promoted_sources must be greater than 0".into(),
            ));
        }
        if self.max_results_per_source == 0 {
            return Err(SuggestError::Config(
                "max_results_per_source must be greater than 0".into(),
            ));
        }
        if self.source_timeout_ms == 0 {
            return Err(SuggestError::Config(
                "source_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.query_threads == 0 {
            return Err(SuggestError::Config(
                "query_threads must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Per-source timeout as a [`Duration`].
    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    /// Publish debounce as a [`Duration`].
    pub fn publish_result_delay(&self) -> Duration {
        Duration::from_millis(self.publish_result_delay_ms)
    }

    /// Typing debounce as a [`Duration`].
    pub fn typing_update_suggestions_delay(&self) -> Duration {
        Duration::from_millis(self.typing_update_suggestions_delay_ms)
    }
}
