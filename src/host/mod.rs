//! Search box host: wires the configured corpora, click history, query
//! coordinator and presenter together, and serves them over stdio.

pub mod contract;
pub mod stdio;

use std::sync::{Arc, Mutex, MutexGuard};

use qsb_suggest::{
    Corpus, CorpusRanker, CorpusRegistry, DefaultCorpusRanker, QueryCoordinator,
    ShortcutRepository, Source, SuggestError, SuggestionRow, Suggestions,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::{CorpusConfig, QsbConfig};
use crate::error::{QsbError, Result};
use crate::history::InMemoryShortcutRepository;
use crate::presenter::DelayingPresenter;
use crate::sources::WordListSource;
use contract::{CorpusStatus, HostEvent};

#[derive(Default)]
struct Session {
    query: String,
    single_corpus: Option<Arc<Corpus>>,
}

/// One search box.
///
/// Must be created inside a tokio runtime.
pub struct SearchHost {
    config: QsbConfig,
    registry: Arc<CorpusRegistry>,
    history: Arc<InMemoryShortcutRepository>,
    coordinator: QueryCoordinator,
    presenter: DelayingPresenter,
    events: UnboundedSender<HostEvent>,
    session: Mutex<Session>,
}

fn build_corpus(config: &CorpusConfig) -> Corpus {
    let source: Arc<dyn Source> = Arc::new(WordListSource::new(
        config.name.clone(),
        config.web,
        config.words.clone(),
    ));
    let mut corpus = Corpus::new(config.name.clone(), vec![source])
        .with_query_threshold(config.query_threshold);
    if let Some(label) = &config.label {
        corpus = corpus.with_label(label.clone());
    }
    if let Some(hint) = &config.hint {
        corpus = corpus.with_hint(hint.clone());
    }
    if config.web {
        corpus = corpus.web();
    }
    if config.default_enabled {
        corpus = corpus.default_enabled();
    }
    if config.query_after_zero_results {
        corpus = corpus.query_after_zero_results();
    }
    if config.accepts_empty_query {
        corpus = corpus.accepts_empty_query();
    }
    corpus
}

impl SearchHost {
    /// Builds the host from `config`. Shown suggestions and command
    /// answers are sent to `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no tokio
    /// runtime is running.
    pub fn new(config: QsbConfig, events: UnboundedSender<HostEvent>) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(CorpusRegistry::new());
        for corpus in &config.corpora {
            registry.add_corpus(Arc::new(build_corpus(corpus)));
        }

        let history = Arc::new(InMemoryShortcutRepository::new(&config.history));
        if config.history.persist {
            let path = config.history.file();
            if path.exists() {
                if let Err(e) = history.load_from_file(&path) {
                    tracing::warn!(error = %e, "ignoring unreadable click history");
                }
            }
        }

        let shortcuts: Arc<dyn ShortcutRepository> = history.clone();
        let ranker: Arc<dyn CorpusRanker> = Arc::new(DefaultCorpusRanker::new(
            Arc::clone(&registry),
            Arc::clone(&shortcuts),
        ));
        let coordinator =
            QueryCoordinator::new(config.suggest.clone(), Arc::clone(&registry), ranker, shortcuts)?;

        let sink = events.clone();
        let presenter = DelayingPresenter::new(Arc::new(move |s: &Suggestions| {
            let _ = sink.send(HostEvent::from_suggestions(s));
        }));

        tracing::info!(
            corpora = config.corpora.len(),
            enabled = registry.enabled_corpora().len(),
            "search host ready"
        );

        Ok(Self {
            config,
            registry,
            history,
            coordinator,
            presenter,
            events,
            session: Mutex::new(Session::default()),
        })
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The corpus registry.
    pub fn registry(&self) -> &Arc<CorpusRegistry> {
        &self.registry
    }

    /// The click history.
    pub fn history(&self) -> &Arc<InMemoryShortcutRepository> {
        &self.history
    }

    /// The presenter holding the shown suggestions.
    pub fn presenter(&self) -> &DelayingPresenter {
        &self.presenter
    }

    /// Issues `text` as the new query.
    pub fn update_query(&self, text: &str) {
        let single_corpus = {
            let mut session = self.session();
            session.query = text.to_owned();
            session.single_corpus.clone()
        };
        self.issue(text, single_corpus);
    }

    fn issue(&self, text: &str, single_corpus: Option<Arc<Corpus>>) {
        let max = if single_corpus.is_some() {
            self.config.suggest.max_results_per_source
        } else {
            self.config.suggest.max_promoted_suggestions
        };
        let suggestions = self.coordinator.get_suggestions(text, single_corpus, max);
        self.presenter.set_suggestions(suggestions);
    }

    /// Records a click on the shown row at `position` and returns the row.
    ///
    /// # Errors
    ///
    /// Returns [`QsbError::Command`] if nothing is shown at `position`.
    pub fn click(&self, position: usize) -> Result<SuggestionRow> {
        let current = self
            .presenter
            .current()
            .ok_or_else(|| QsbError::Command("no suggestions shown".into()))?;
        let row = current
            .visible_rows()
            .get(position)
            .cloned()
            .ok_or_else(|| QsbError::Command(format!("no suggestion at position {position}")))?;
        self.history.report_click(&current, position);
        Ok(row)
    }

    fn resolve(&self, name: Option<&str>) -> Result<Option<Arc<Corpus>>> {
        match name {
            None => Ok(None),
            Some(name) => self
                .registry
                .corpus(name)
                .map(Some)
                .ok_or_else(|| SuggestError::UnknownCorpus(name.to_owned()).into()),
        }
    }

    /// Queries only `name` from now on, or all corpora with `None`, and
    /// re-issues the current query.
    ///
    /// # Errors
    ///
    /// Returns an error if no corpus has that name.
    pub fn select_corpus(&self, name: Option<&str>) -> Result<()> {
        let corpus = self.resolve(name)?;
        let query = {
            let mut session = self.session();
            session.single_corpus = corpus.clone();
            session.query.clone()
        };
        self.presenter.set_corpus_filter(None);
        self.issue(&query, corpus);
        Ok(())
    }

    /// Restricts the shown rows to one corpus of the current query.
    ///
    /// # Errors
    ///
    /// Returns an error if no corpus has that name.
    pub fn view_corpus(&self, name: Option<&str>) -> Result<()> {
        let corpus = self.resolve(name)?;
        self.presenter.set_corpus_filter(corpus);
        Ok(())
    }

    /// Enables or disables a corpus.
    ///
    /// # Errors
    ///
    /// Returns an error if no corpus has that name.
    pub fn set_corpus_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.registry.set_enabled(name, enabled)?;
        tracing::info!(corpus = name, enabled, "corpus toggled");
        Ok(())
    }

    /// Every corpus with its enabled state, in registration order.
    pub fn corpora(&self) -> Vec<CorpusStatus> {
        self.registry
            .all_corpora()
            .iter()
            .map(|c| CorpusStatus {
                name: c.name.clone(),
                label: c.label.clone(),
                hint: c.hint.clone(),
                web: c.is_web,
                enabled: self.registry.is_enabled(&c.name),
            })
            .collect()
    }

    /// Forgets the click history.
    pub fn clear_history(&self) {
        self.history.clear_history();
    }

    /// Sends an event to the host's output.
    pub fn emit(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("event receiver gone");
        }
    }

    /// Cancels the query in flight, releases the shown suggestions and
    /// saves the click history.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be saved.
    pub fn shutdown(&self) -> Result<()> {
        self.coordinator.close();
        self.presenter.close();
        if self.config.history.persist {
            self.history.save_to_file(&self.config.history.file())?;
        }
        tracing::info!("search host stopped");
        Ok(())
    }
}
