//! Error types for the search box host.

use qsb_suggest::SuggestError;

/// Top-level error type for the host.
#[derive(Debug, thiserror::Error)]
pub enum QsbError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Host command rejected (unknown corpus, nothing to click, ...).
    #[error("command error: {0}")]
    Command(String),

    /// Click history storage error.
    #[error("history error: {0}")]
    History(String),

    /// Suggestion engine error.
    #[error(transparent)]
    Suggest(#[from] SuggestError),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, QsbError>;
