//! Query coordination: from a typed query to a live [`Suggestions`].
//!
//! [`QueryCoordinator::get_suggestions`] picks the corpora to query,
//! attaches shortcuts, and fans the corpus queries out through a batching
//! executor onto a bounded worker pool. Completed results flow over a
//! channel to a single publish task, which debounces them into the
//! session. At most one query is in flight: starting a query cancels the
//! previous one and releases its session unless a consumer claimed it.

mod executor;
mod publisher;
mod query_task;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::config::SuggestConfig;
use crate::corpus::Corpus;
use crate::error::{Result, SuggestError};
use crate::promoter::Promoter;
use crate::ranker::CorpusRanker;
use crate::registry::CorpusRegistry;
use crate::shortcuts::ShortcutRepository;
use crate::should_query::ShouldQueryStrategy;
use crate::suggestions::{RefreshRequest, RefreshSink, Suggestions};

use executor::{BatchingExecutor, WorkerPool};
use publisher::{ActiveQuery, PublishEvent, Publisher};
use query_task::QueryTask;

struct CurrentQuery {
    generation: u64,
    suggestions: Suggestions,
    executor: Option<Arc<BatchingExecutor>>,
}

/// Issues queries against the registered corpora.
///
/// Must be created inside a tokio runtime; the publish task and the
/// worker pool run on that runtime. [`get_suggestions`](Self::get_suggestions)
/// itself is synchronous and can be called from any thread.
pub struct QueryCoordinator {
    config: SuggestConfig,
    registry: Arc<CorpusRegistry>,
    ranker: Arc<dyn CorpusRanker>,
    shortcuts: Arc<dyn ShortcutRepository>,
    strategy: Arc<ShouldQueryStrategy>,
    all_corpora_promoter: Promoter,
    single_corpus_promoter: Promoter,
    pool: WorkerPool,
    publish: mpsc::UnboundedSender<PublishEvent>,
    generation: AtomicU64,
    current: Mutex<Option<CurrentQuery>>,
}

impl QueryCoordinator {
    /// Creates a coordinator and starts its publish task.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestError::Config`] if `config` is invalid or no tokio
    /// runtime is running.
    pub fn new(
        config: SuggestConfig,
        registry: Arc<CorpusRegistry>,
        ranker: Arc<dyn CorpusRanker>,
        shortcuts: Arc<dyn ShortcutRepository>,
    ) -> Result<Self> {
        Self::with_strategy(
            config,
            registry,
            ranker,
            shortcuts,
            Arc::new(ShouldQueryStrategy::new()),
        )
    }

    /// Like [`new`](Self::new) with a caller-provided should-query strategy.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_strategy(
        config: SuggestConfig,
        registry: Arc<CorpusRegistry>,
        ranker: Arc<dyn CorpusRanker>,
        shortcuts: Arc<dyn ShortcutRepository>,
        strategy: Arc<ShouldQueryStrategy>,
    ) -> Result<Self> {
        config.validate()?;
        let handle = Handle::try_current().map_err(|e| {
            SuggestError::Config(format!("query coordinator needs a tokio runtime: {e}"))
        })?;

        let (publish, events) = mpsc::unbounded_channel();
        let publisher = Publisher::new(
            events,
            Arc::clone(&strategy),
            Arc::clone(&shortcuts),
            config.publish_result_delay(),
            config.num_promoted_sources,
        );
        handle.spawn(publisher.run());

        tracing::debug!(
            query_threads = config.query_threads,
            publish_delay_ms = config.publish_result_delay_ms,
            "query coordinator started"
        );

        Ok(Self {
            all_corpora_promoter: Promoter::all_corpora(&config),
            single_corpus_promoter: Promoter::single_corpus(),
            pool: WorkerPool::new(handle, config.query_threads),
            config,
            registry,
            ranker,
            shortcuts,
            strategy,
            publish,
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
        })
    }

    /// The configuration this coordinator runs with.
    pub fn config(&self) -> &SuggestConfig {
        &self.config
    }

    /// The zero-result memo consulted before querying a corpus.
    pub fn should_query_strategy(&self) -> &Arc<ShouldQueryStrategy> {
        &self.strategy
    }

    /// Starts a query and returns its session.
    ///
    /// With `single_corpus`, only that corpus is queried and the
    /// single-corpus promoter is used. Otherwise the ranked, enabled
    /// corpora that pass the should-query checks are queried in batches.
    /// The previous query's tasks are cancelled and its session released,
    /// unless it was [claimed](Suggestions::claim).
    pub fn get_suggestions(
        &self,
        query: &str,
        single_corpus: Option<Arc<Corpus>>,
        max_promoted: usize,
    ) -> Suggestions {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.take() {
            self.cancel(previous);
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let corpora = self.corpora_to_query(query, single_corpus.as_ref());
        let promoter = if single_corpus.is_some() {
            self.single_corpus_promoter.clone()
        } else {
            self.all_corpora_promoter.clone()
        };

        let suggestions = Suggestions::new(query, corpora.clone(), promoter, max_promoted);
        suggestions.set_refresh_sink(self.refresh_sink());
        let allowed = match &single_corpus {
            Some(corpus) => vec![Arc::clone(corpus)],
            None => self.registry.enabled_corpora(),
        };
        suggestions.set_shortcuts(self.shortcuts.shortcuts_for_query(query, &allowed));

        if corpora.is_empty() {
            tracing::debug!(generation, "no corpora to query");
            *current = Some(CurrentQuery {
                generation,
                suggestions: suggestions.clone(),
                executor: None,
            });
            return suggestions;
        }

        let default_count = corpora.iter().filter(|c| c.default_enabled).count();
        let initial_batch_size = if default_count == 0 {
            self.config.num_promoted_sources
        } else {
            default_count
        };

        let tasks = corpora
            .iter()
            .map(|corpus| QueryTask {
                generation,
                corpus: Arc::clone(corpus),
                query: query.to_owned(),
                max_results: self.config.max_results_per_source,
                timeout: self.config.source_timeout(),
                publish: self.publish.clone(),
            })
            .collect();
        let executor = Arc::new(BatchingExecutor::new(self.pool.clone(), tasks));

        tracing::debug!(
            generation,
            corpora = ?corpora.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            initial_batch_size,
            "query started"
        );
        tracing::trace!(generation, query, "query text");

        let begin = ActiveQuery::new(
            generation,
            suggestions.clone(),
            Arc::clone(&executor),
            initial_batch_size,
        );
        if self.publish.send(PublishEvent::Begin(begin)).is_err() {
            tracing::warn!(generation, "publish task is gone, query not started");
        } else {
            executor.execute_next_batch(initial_batch_size);
        }

        *current = Some(CurrentQuery {
            generation,
            suggestions: suggestions.clone(),
            executor: Some(executor),
        });
        suggestions
    }

    /// Cancels the query in flight, if any, and releases its session
    /// unless it was claimed.
    pub fn close(&self) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(previous) = previous {
            self.cancel(previous);
        }
    }

    fn cancel(&self, query: CurrentQuery) {
        if let Some(executor) = &query.executor {
            executor.cancel_pending_tasks();
        }
        // Ignored when the publish task is gone: nothing is pending then.
        let _ = self.publish.send(PublishEvent::End {
            generation: query.generation,
        });
        if query.suggestions.is_claimed() {
            tracing::debug!(generation = query.generation, "previous suggestions left to their owner");
        } else if query.suggestions.release() {
            tracing::debug!(generation = query.generation, "previous suggestions released");
        }
    }

    fn corpora_to_query(&self, query: &str, single_corpus: Option<&Arc<Corpus>>) -> Vec<Arc<Corpus>> {
        self.strategy.update_query(query);
        if let Some(corpus) = single_corpus {
            return vec![Arc::clone(corpus)];
        }
        self.ranker
            .ranked_corpora()
            .into_iter()
            .filter(|corpus| self.registry.is_enabled(&corpus.name))
            .filter(|corpus| !query.is_empty() || corpus.is_web || corpus.accepts_empty_query)
            .filter(|corpus| self.strategy.should_query(corpus, query))
            .collect()
    }

    fn refresh_sink(&self) -> RefreshSink {
        let registry = Arc::clone(&self.registry);
        let pool = self.pool.clone();
        let publish = self.publish.clone();
        let timeout = self.config.source_timeout();
        Arc::new(move |suggestions: Suggestions, request: RefreshRequest| {
            let Some(source) = registry.source(&request.source) else {
                tracing::debug!(source = %request.source, "shortcut source no longer registered");
                return;
            };
            let publish = publish.clone();
            pool.spawn(async move {
                let outcome =
                    match tokio::time::timeout(timeout, source.refresh_shortcut(&request.shortcut_id))
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(_elapsed) => Err(SuggestError::Timeout(format!(
                            "refreshing shortcut {} from {}",
                            request.shortcut_id, request.source
                        ))),
                    };
                let event = PublishEvent::ShortcutRefreshed {
                    suggestions,
                    request,
                    outcome,
                };
                if publish.send(event).is_err() {
                    tracing::trace!("publish task gone, dropping shortcut refresh");
                }
            });
        })
    }
}

impl Drop for QueryCoordinator {
    fn drop(&mut self) {
        self.close();
    }
}
