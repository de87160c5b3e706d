//! Worker pool and the per-query batching executor.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::query_task::QueryTask;

/// Runs source work on the runtime with bounded concurrency.
#[derive(Clone)]
pub(crate) struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    pub(crate) fn new(handle: Handle, threads: usize) -> Self {
        Self {
            handle,
            permits: Arc::new(Semaphore::new(threads.max(1))),
        }
    }

    /// Spawns `work`, which starts once a worker slot is free.
    pub(crate) fn spawn<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.handle.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            work.await;
        });
    }
}

/// Holds one query's tasks and releases them to the pool in batches.
///
/// Tasks left in the queue when the query is superseded never run;
/// tasks already running observe the cancellation token.
pub(crate) struct BatchingExecutor {
    pool: WorkerPool,
    queue: Mutex<VecDeque<QueryTask>>,
    cancel: CancellationToken,
}

impl BatchingExecutor {
    pub(crate) fn new(pool: WorkerPool, tasks: Vec<QueryTask>) -> Self {
        Self {
            pool,
            queue: Mutex::new(tasks.into()),
            cancel: CancellationToken::new(),
        }
    }

    /// Starts up to `batch_size` queued tasks. Returns how many started.
    pub(crate) fn execute_next_batch(&self, batch_size: usize) -> usize {
        if self.cancel.is_cancelled() {
            return 0;
        }
        let batch: Vec<QueryTask> = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            let n = batch_size.min(queue.len());
            queue.drain(..n).collect()
        };
        let started = batch.len();
        for task in batch {
            let cancel = self.cancel.child_token();
            self.pool.spawn(task.run(cancel));
        }
        if started > 0 {
            tracing::debug!(started, "query batch started");
        }
        started
    }

    /// Drops queued tasks and cancels running ones.
    pub(crate) fn cancel_pending_tasks(&self) {
        let dropped = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            let dropped = queue.len();
            queue.clear();
            dropped
        };
        self.cancel.cancel();
        tracing::debug!(dropped, "pending query tasks cancelled");
    }
}
