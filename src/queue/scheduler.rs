//! Sequential command queue
//!
//! A run takes a snapshot of the pending items when `start()` is called and
//! dispatches them one at a time on a dedicated task. At most one item is
//! `Running` and at most one dispatch is in flight. `stop()` is cooperative:
//! it is honoured between items and never interrupts the current one.

use crate::agent::dispatch::{Dispatch, DispatchError};
use crate::core::error::{RelayError, Result};
use crate::core::types::QueueItemId;
use crate::queue::item::{QueueItem, QueueStats, QueueStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Error recorded on an item whose run was aborted while it was in flight
pub const RUN_ABORTED: &str = "Queue run aborted";

/// Outcome of one `start()` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items that were dispatched
    pub processed: usize,
    pub completed: usize,
    pub failed: usize,
    /// Run ended early because `stop()` was called
    pub stopped: bool,
}

#[derive(Debug, Default)]
struct QueueState {
    items: Vec<QueueItem>,
    current_index: Option<usize>,
    run_token: Option<CancellationToken>,
}

impl QueueState {
    fn position(&self, id: QueueItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}

#[derive(Debug, Default)]
struct QueueShared {
    state: Mutex<QueueState>,
    processing: AtomicBool,
}

impl QueueShared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ordered command queue with a single-flight runner
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    shared: Arc<QueueShared>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one command; blank input is ignored
    pub fn enqueue(&self, command: &str) -> Option<QueueItemId> {
        self.enqueue_many([command]).into_iter().next()
    }

    /// Append commands in order, skipping entries that are blank once trimmed
    pub fn enqueue_many<I, S>(&self, commands: I) -> Vec<QueueItemId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let new_items: Vec<QueueItem> = commands
            .into_iter()
            .map(|command| command.as_ref().trim().to_string())
            .filter(|command| !command.is_empty())
            .map(QueueItem::new)
            .collect();

        let ids: Vec<QueueItemId> = new_items.iter().map(|item| item.id).collect();
        if !ids.is_empty() {
            let mut state = self.shared.lock();
            state.items.extend(new_items);
            debug!(added = ids.len(), total = state.items.len(), "Commands enqueued");
        }
        ids
    }

    /// Remove an item by id
    ///
    /// Only pending items should be removed; the queue does not check the
    /// item's status, but it does refuse while a run is in progress.
    /// Returns whether an item was removed.
    pub fn remove(&self, id: QueueItemId) -> Result<bool> {
        self.ensure_idle("remove")?;
        let mut state = self.shared.lock();
        match state.position(id) {
            Some(index) => {
                state.items.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Empty the queue; refused while a run is in progress
    pub fn clear(&self) -> Result<()> {
        self.ensure_idle("clear")?;
        let mut state = self.shared.lock();
        state.items.clear();
        state.current_index = None;
        Ok(())
    }

    /// Move the item at `from` so it ends up at index `to`
    pub fn reorder(&self, from: usize, to: usize) -> Result<()> {
        self.ensure_idle("reorder")?;
        let mut state = self.shared.lock();
        let len = state.items.len();
        for index in [from, to] {
            if index >= len {
                return Err(RelayError::IndexOutOfRange { index, len });
            }
        }
        let item = state.items.remove(from);
        state.items.insert(to, item);
        Ok(())
    }

    /// Stop the current run after the in-flight item finishes
    ///
    /// Returns `false` when no run is in progress. Does not signal the
    /// agent; use `DispatchClient::stop` for that.
    pub fn stop(&self) -> bool {
        let state = self.shared.lock();
        match &state.run_token {
            Some(token) => {
                info!("Queue stop requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Begin processing the currently pending items
    ///
    /// No-op returning `None` if a run is already in progress or the queue
    /// is empty. Items enqueued after this call wait for the next run.
    pub fn start<D: Dispatch>(&self, dispatch: D) -> Option<JoinHandle<RunSummary>> {
        if self
            .shared
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Queue already processing; start ignored");
            return None;
        }

        let (snapshot, token) = {
            let mut state = self.shared.lock();
            if state.items.is_empty() {
                self.shared.processing.store(false, Ordering::SeqCst);
                return None;
            }
            let snapshot: Vec<QueueItemId> = state
                .items
                .iter()
                .filter(|item| item.status == QueueStatus::Pending)
                .map(|item| item.id)
                .collect();
            let token = CancellationToken::new();
            state.run_token = Some(token.clone());
            (snapshot, token)
        };

        info!(items = snapshot.len(), "Queue run started");
        let shared = Arc::clone(&self.shared);
        Some(tokio::spawn(run_snapshot(shared, Arc::new(dispatch), snapshot, token)))
    }

    /// `start()` and wait for the run to finish
    pub async fn run<D: Dispatch>(&self, dispatch: D) -> Option<RunSummary> {
        let handle = self.start(dispatch)?;
        match handle.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!(error = %e, "Queue worker terminated abnormally");
                None
            }
        }
    }

    pub fn items(&self) -> Vec<QueueItem> {
        self.shared.lock().items.clone()
    }

    pub fn get(&self, id: QueueItemId) -> Option<QueueItem> {
        let state = self.shared.lock();
        state.position(id).map(|index| state.items[index].clone())
    }

    pub fn len(&self) -> usize {
        self.shared.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().items.is_empty()
    }

    pub fn is_processing(&self) -> bool {
        self.shared.processing.load(Ordering::SeqCst)
    }

    /// Index of the running item; `None` when idle
    pub fn current_index(&self) -> Option<usize> {
        self.shared.lock().current_index
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats::from_items(self.shared.lock().items.iter())
    }

    /// Percent of items completed or failed; 0 when empty
    pub fn progress(&self) -> f64 {
        self.stats().progress()
    }

    fn ensure_idle(&self, operation: &'static str) -> Result<()> {
        if self.is_processing() {
            warn!(operation, "Queue mutation rejected during run");
            return Err(RelayError::QueueBusy(operation));
        }
        Ok(())
    }
}

/// Resets run bookkeeping when the worker exits, even by panic
struct RunGuard {
    shared: Arc<QueueShared>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        {
            let mut state = self.shared.lock();
            // Only an aborted run leaves an item running
            for item in state.items.iter_mut() {
                if item.fail(RUN_ABORTED) {
                    warn!(id = %item.id, command = %item.command, "Queue run aborted mid-item");
                }
            }
            state.current_index = None;
            state.run_token = None;
        }
        self.shared.processing.store(false, Ordering::SeqCst);
    }
}

/// Aborts the dispatch task if the run is dropped while awaiting it
struct DispatchTask<T>(JoinHandle<T>);

impl<T> Drop for DispatchTask<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_snapshot<D: Dispatch>(
    shared: Arc<QueueShared>,
    dispatch: Arc<D>,
    snapshot: Vec<QueueItemId>,
    token: CancellationToken,
) -> RunSummary {
    let _guard = RunGuard {
        shared: Arc::clone(&shared),
    };
    let mut summary = RunSummary::default();

    for id in snapshot {
        if token.is_cancelled() {
            summary.stopped = true;
            break;
        }

        let command = {
            let mut state = shared.lock();
            let Some(index) = state.position(id) else {
                continue;
            };
            if !state.items[index].mark_running() {
                continue;
            }
            state.current_index = Some(index);
            state.items[index].command.clone()
        };

        debug!(%id, command, "Queue item running");
        let dispatcher = Arc::clone(&dispatch);
        let mut task = DispatchTask(tokio::spawn(async move {
            dispatcher.dispatch(command).await
        }));
        let outcome = (&mut task.0).await;
        summary.processed += 1;

        let mut state = shared.lock();
        let Some(index) = state.position(id) else {
            continue;
        };
        let item = &mut state.items[index];
        match outcome {
            Ok(Ok(result)) => {
                item.finish(&result);
            }
            Ok(Err(e)) => {
                item.fail(e.to_string());
            }
            Err(join_error) => {
                item.fail(DispatchError::Panicked(join_error.to_string()).to_string());
            }
        }

        if item.status == QueueStatus::Completed {
            summary.completed += 1;
        } else {
            summary.failed += 1;
        }
        debug!(%id, status = ?item.status, "Queue item finished");
    }

    info!(
        processed = summary.processed,
        completed = summary.completed,
        failed = summary.failed,
        stopped = summary.stopped,
        "Queue run finished"
    );
    summary
}
