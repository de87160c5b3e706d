//! # qsb-suggest
//!
//! Multi-corpus query suggestions for a search box.
//!
//! Given a partially typed query, this crate queries a set of ranked
//! corpora (web, apps, contacts, ...) through their sources, merges the
//! answers with click-history shortcuts and promotes a short, ordered list
//! of rows to show the user.
//!
//! ## Design
//!
//! - [`CorpusRegistry`] holds the corpora and the enabled set
//! - [`CorpusRanker`] orders corpora by default status and click score
//! - [`ShouldQueryStrategy`] skips corpora that came back empty for a
//!   shorter query
//! - [`QueryCoordinator`] fans queries out in batches on a bounded worker
//!   pool, with per-source timeouts and cancellation of the previous query
//! - [`Suggestions`] is the session the UI observes; results are debounced
//!   into it from a single publish task
//! - [`Promoter`] strategies pick the visible rows
//!
//! Source failures never surface as errors: a failing or slow source simply
//! contributes no rows. Query text is logged only at trace level.

pub mod config;
pub mod coordinator;
pub mod corpus;
pub mod error;
pub mod observer;
pub mod promoter;
pub mod ranker;
pub mod registry;
pub mod shortcuts;
pub mod should_query;
pub mod source;
pub mod suggestions;
pub mod types;

pub use config::SuggestConfig;
pub use coordinator::QueryCoordinator;
pub use corpus::{Corpus, CorpusResult};
pub use error::{Result, SuggestError};
pub use observer::{Observer, ObserverList};
pub use promoter::{PromotedList, Promoter};
pub use ranker::{CorpusRanker, DefaultCorpusRanker, LexicographicalCorpusRanker};
pub use registry::CorpusRegistry;
pub use shortcuts::{ShortcutCursor, ShortcutRepository};
pub use should_query::ShouldQueryStrategy;
pub use source::{ReleaseHook, ShortcutRefresh, Source, SourceResult};
pub use suggestions::{RefreshRequest, Suggestions};
pub use types::{IntentPayload, SourceId, SuggestionRow};
