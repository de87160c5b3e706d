//! Error types for the qsb-suggest crate.
//!
//! Per-source failures are recovered inside the coordinator and never reach
//! the caller; the variants here surface configuration problems and
//! lifecycle misuse of a [`Suggestions`](crate::Suggestions) session.

/// Errors that can occur while producing suggestions.
#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    /// A suggestion source failed to answer a query.
    #[error("source error: {0}")]
    Source(String),

    /// A suggestion source did not answer within its timeout.
    #[error("source timed out: {0}")]
    Timeout(String),

    /// Invalid engine configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A session object was used after it was closed, or closed twice.
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// A corpus result was delivered to a session for a different query.
    #[error("got result for wrong query: expected {expected:?}, got {actual:?}")]
    WrongQuery {
        /// The query of the receiving session.
        expected: String,
        /// The query the result answered.
        actual: String,
    },

    /// A corpus name did not resolve to a registered corpus.
    #[error("unknown corpus: {0}")]
    UnknownCorpus(String),
}

/// Convenience type alias for qsb-suggest results.
pub type Result<T> = std::result::Result<T, SuggestError>;
