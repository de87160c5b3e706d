//! Newline-delimited JSON commands and events of the stdio host.
//!
//! Commands are tagged by `"command"`, events by `"event"`:
//!
//! ```json
//! {"command":"query.update","text":"ma"}
//! {"event":"suggestions","session":3,"query":"ma","done":true,"corpus":null,"rows":[...]}
//! ```

use qsb_suggest::{SuggestionRow, Suggestions};
use serde::{Deserialize, Serialize};

/// A command read from stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum HostCommand {
    /// The text in the search box changed. Debounced before querying.
    #[serde(rename = "query.update")]
    QueryUpdate { text: String },
    /// The user clicked the shown row at `position`.
    #[serde(rename = "suggestions.click")]
    Click { position: usize },
    /// Query only the named corpus, or all corpora with `null`.
    #[serde(rename = "corpus.select")]
    SelectCorpus {
        #[serde(default)]
        name: Option<String>,
    },
    /// Show only the named corpus' rows of the current query.
    #[serde(rename = "corpus.view")]
    ViewCorpus {
        #[serde(default)]
        name: Option<String>,
    },
    /// Enable or disable a corpus.
    #[serde(rename = "corpus.enable")]
    EnableCorpus { name: String, enabled: bool },
    /// Report every corpus and whether it is enabled.
    #[serde(rename = "corpus.list")]
    ListCorpora,
    /// Forget the click history.
    #[serde(rename = "history.clear")]
    ClearHistory,
    /// Stop the host.
    #[serde(rename = "runtime.stop")]
    Stop,
}

/// Corpus state reported by [`HostEvent::Corpora`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStatus {
    pub name: String,
    pub label: String,
    pub hint: Option<String>,
    pub web: bool,
    pub enabled: bool,
}

/// An event written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum HostEvent {
    /// The shown suggestions changed.
    #[serde(rename = "suggestions")]
    Suggestions {
        session: u64,
        query: String,
        done: bool,
        corpus: Option<String>,
        rows: Vec<SuggestionRow>,
    },
    /// A clicked row to launch.
    #[serde(rename = "launch")]
    Launch { row: SuggestionRow },
    /// Answer to `corpus.list` and corpus state changes.
    #[serde(rename = "corpora")]
    Corpora { corpora: Vec<CorpusStatus> },
    /// A command failed.
    #[serde(rename = "error")]
    Error { message: String },
}

impl HostEvent {
    /// Snapshot of what `suggestions` shows.
    pub fn from_suggestions(suggestions: &Suggestions) -> Self {
        Self::Suggestions {
            session: suggestions.id(),
            query: suggestions.query().to_owned(),
            done: suggestions.is_done(),
            corpus: suggestions.corpus_filter().map(|c| c.name.clone()),
            rows: suggestions.visible_rows(),
        }
    }
}
