//! qsb: a quick search box host.
//!
//! Serves multi-corpus query suggestions from [`qsb_suggest`] for corpora
//! described in a TOML config file:
//!
//! keystrokes → typing debounce → [`QueryCoordinator`](qsb_suggest::QueryCoordinator)
//! → [`DelayingPresenter`] → JSON events
//!
//! Clicks are remembered by [`InMemoryShortcutRepository`], which feeds both
//! shortcuts and corpus ranking back into later queries.

pub mod config;
pub mod error;
pub mod history;
pub mod host;
pub mod presenter;
pub mod qsb_dirs;
pub mod sources;

pub use config::{CorpusConfig, HistoryConfig, QsbConfig};
pub use error::{QsbError, Result};
pub use history::{ClickRecord, InMemoryShortcutRepository};
pub use host::SearchHost;
pub use host::contract::{CorpusStatus, HostCommand, HostEvent};
pub use presenter::DelayingPresenter;
pub use sources::WordListSource;
