//! The publish task: the single context that feeds corpus results into
//! the current [`Suggestions`].
//!
//! Results from the worker pool are buffered and published after a short
//! debounce, or at once when they complete a batch or the whole query.
//! Completing a batch pulls the next one from the executor while the
//! promoted list is still short.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use super::executor::BatchingExecutor;
use crate::corpus::CorpusResult;
use crate::error::Result;
use crate::shortcuts::ShortcutRepository;
use crate::should_query::ShouldQueryStrategy;
use crate::source::ShortcutRefresh;
use crate::suggestions::{RefreshRequest, Suggestions};

pub(crate) enum PublishEvent {
    /// A new query replaces the current one.
    Begin(ActiveQuery),
    /// The query with this generation was cancelled.
    End { generation: u64 },
    /// One corpus answered.
    Result {
        generation: u64,
        result: CorpusResult,
    },
    /// A promoted shortcut was re-validated against its source.
    ShortcutRefreshed {
        suggestions: Suggestions,
        request: RefreshRequest,
        outcome: Result<ShortcutRefresh>,
    },
}

/// Publishing state of the query in flight.
pub(crate) struct ActiveQuery {
    generation: u64,
    suggestions: Suggestions,
    executor: Arc<BatchingExecutor>,
    /// Published result count that completes the current batch.
    next_batch_at: usize,
    pending: Vec<CorpusResult>,
    deadline: Option<Instant>,
}

impl ActiveQuery {
    pub(crate) fn new(
        generation: u64,
        suggestions: Suggestions,
        executor: Arc<BatchingExecutor>,
        initial_batch_size: usize,
    ) -> Self {
        Self {
            generation,
            suggestions,
            executor,
            next_batch_at: initial_batch_size,
            pending: Vec::new(),
            deadline: None,
        }
    }

    fn publish_pending(&mut self) {
        self.deadline = None;
        if self.pending.is_empty() {
            return;
        }
        let results = std::mem::take(&mut self.pending);
        if let Err(err) = self.suggestions.add_corpus_results(results) {
            tracing::warn!(session = self.suggestions.id(), error = %err, "failed to publish results");
        }
    }

    fn discard(mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(
                generation = self.generation,
                count = self.pending.len(),
                "discarding unpublished results"
            );
        }
        for result in &mut self.pending {
            result.close();
        }
    }
}

pub(crate) struct Publisher {
    events: mpsc::UnboundedReceiver<PublishEvent>,
    strategy: Arc<ShouldQueryStrategy>,
    shortcuts: Arc<dyn ShortcutRepository>,
    publish_delay: Duration,
    num_promoted_sources: usize,
    active: Option<ActiveQuery>,
}

impl Publisher {
    pub(crate) fn new(
        events: mpsc::UnboundedReceiver<PublishEvent>,
        strategy: Arc<ShouldQueryStrategy>,
        shortcuts: Arc<dyn ShortcutRepository>,
        publish_delay: Duration,
        num_promoted_sources: usize,
    ) -> Self {
        Self {
            events,
            strategy,
            shortcuts,
            publish_delay,
            num_promoted_sources,
            active: None,
        }
    }

    /// Runs until every sender is gone.
    pub(crate) async fn run(mut self) {
        loop {
            let deadline = self.active.as_ref().and_then(|a| a.deadline);
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(active) = self.active.as_mut() {
                        tracing::trace!(generation = active.generation, "publishing delayed results");
                        active.publish_pending();
                    }
                }
            }
        }
        if let Some(active) = self.active.take() {
            active.discard();
        }
        tracing::debug!("publish task stopped");
    }

    fn handle(&mut self, event: PublishEvent) {
        match event {
            PublishEvent::Begin(query) => {
                if let Some(previous) = self.active.replace(query) {
                    previous.discard();
                }
            }
            PublishEvent::End { generation } => {
                if self.active.as_ref().is_some_and(|a| a.generation == generation) {
                    if let Some(active) = self.active.take() {
                        active.discard();
                    }
                }
            }
            PublishEvent::Result { generation, result } => self.consume(generation, result),
            PublishEvent::ShortcutRefreshed {
                suggestions,
                request,
                outcome,
            } => self.apply_refresh(&suggestions, &request, outcome),
        }
    }

    fn consume(&mut self, generation: u64, mut result: CorpusResult) {
        let Some(active) = self.active.as_mut().filter(|a| a.generation == generation) else {
            tracing::debug!(
                generation,
                corpus = %result.corpus().name,
                "closing result of superseded query"
            );
            result.close();
            return;
        };

        let count = result.len();
        tracing::debug!(
            corpus = %result.corpus().name,
            latency_ms = result.latency().as_millis() as u64,
            count,
            "corpus result received"
        );
        if count == 0 {
            self.strategy
                .on_zero_results(result.corpus(), result.user_query());
        }
        active.pending.push(result);

        let suggestions = &active.suggestions;
        let total = suggestions.result_count() + active.pending.len();
        let last_of_query = total >= suggestions.expected_result_count();
        if !self.publish_delay.is_zero()
            && !suggestions.is_closed()
            && total < active.next_batch_at
            && !last_of_query
        {
            active.deadline = Some(Instant::now() + self.publish_delay);
        } else {
            active.publish_pending();
        }

        if !active.suggestions.is_closed() {
            Self::execute_next_batch_if_needed(active, self.num_promoted_sources);
        }
    }

    fn execute_next_batch_if_needed(active: &mut ActiveQuery, batch_size: usize) {
        let suggestions = &active.suggestions;
        if suggestions.result_count() != active.next_batch_at {
            return;
        }
        if suggestions.promoted().len() >= suggestions.max_promoted() {
            return;
        }
        active.next_batch_at += batch_size;
        let started = active.executor.execute_next_batch(batch_size);
        tracing::debug!(
            generation = active.generation,
            started,
            next_batch_at = active.next_batch_at,
            "batch complete, querying more corpora"
        );
    }

    fn apply_refresh(
        &self,
        suggestions: &Suggestions,
        request: &RefreshRequest,
        outcome: Result<ShortcutRefresh>,
    ) {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(
                    source = %request.source,
                    shortcut = %request.shortcut_id,
                    error = %err,
                    "shortcut refresh failed"
                );
                return;
            }
        };
        match &outcome {
            ShortcutRefresh::Unchanged => return,
            ShortcutRefresh::Updated(row) => {
                self.shortcuts
                    .update_shortcut(&request.source, &request.shortcut_id, Some(row));
            }
            ShortcutRefresh::Invalid => {
                self.shortcuts
                    .update_shortcut(&request.source, &request.shortcut_id, None);
            }
        }
        if suggestions.apply_shortcut_refresh(request, &outcome) {
            tracing::debug!(
                source = %request.source,
                shortcut = %request.shortcut_id,
                "shortcut refreshed"
            );
        }
    }
}
