//! One corpus query, run on the worker pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::publisher::PublishEvent;
use crate::corpus::Corpus;

pub(crate) struct QueryTask {
    pub(crate) generation: u64,
    pub(crate) corpus: Arc<Corpus>,
    pub(crate) query: String,
    pub(crate) max_results: usize,
    pub(crate) timeout: Duration,
    pub(crate) publish: mpsc::UnboundedSender<PublishEvent>,
}

impl QueryTask {
    /// Queries the corpus and hands the result to the publish task.
    ///
    /// A cancelled task drops its in-flight source calls, which releases
    /// anything they already produced. A result the publish task can no
    /// longer accept is closed here.
    pub(crate) async fn run(self, cancel: CancellationToken) {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::trace!(corpus = %self.corpus.name, generation = self.generation, "query task cancelled");
                return;
            }
            result = self.corpus.query(&self.query, self.max_results, self.timeout) => result,
        };

        let event = PublishEvent::Result {
            generation: self.generation,
            result,
        };
        if let Err(mpsc::error::SendError(event)) = self.publish.send(event) {
            if let PublishEvent::Result { mut result, .. } = event {
                tracing::debug!(corpus = %self.corpus.name, "publish task gone, closing result");
                result.close();
            }
        }
    }
}
