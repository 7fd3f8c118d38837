//! Cancellable delayed tasks keyed by action id.
//!
//! [`TaskScheduler`] is the single timing primitive of the engine: run a
//! future after a delay, and be able to cancel it by action id. A task
//! deregisters itself before it runs, so [`TaskScheduler::cancel`] after
//! the timer fired is a harmless `false`.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use impulse_types::ActionId;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

/// Registry of outstanding delayed tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    tasks: Arc<Mutex<BTreeMap<ActionId, AbortHandle>>>,
}

impl TaskScheduler {
    /// An empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once `delay` has elapsed.
    ///
    /// Scheduling a second task under the same id replaces (and aborts)
    /// the first.
    pub async fn schedule_after<F>(&self, action_id: ActionId, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let registry = Arc::clone(&self.tasks);
        // Held across the spawn so the task cannot deregister before it
        // has been registered.
        let mut tasks = self.tasks.lock().await;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if registry.lock().await.remove(&action_id).is_none() {
                return;
            }
            trace!(%action_id, "scheduled task firing");
            task.await;
        });
        if let Some(previous) = tasks.insert(action_id, handle.abort_handle()) {
            previous.abort();
        }
        debug!(%action_id, delay_ms = delay.as_millis(), "task scheduled");
    }

    /// Cancel the task registered under `action_id`.
    ///
    /// Returns `true` if a task was still waiting. Idempotent: unknown ids,
    /// repeated calls and calls after the task fired all return `false`.
    pub async fn cancel(&self, action_id: ActionId) -> bool {
        let removed = self.tasks.lock().await.remove(&action_id);
        removed.is_some_and(|handle| {
            handle.abort();
            debug!(%action_id, "scheduled task cancelled");
            true
        })
    }

    /// Number of tasks still waiting to fire.
    pub async fn pending(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Cancel every waiting task. Returns how many were cancelled.
    pub async fn cancel_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.tasks.lock().await);
        let count = drained.len();
        for handle in drained.into_values() {
            handle.abort();
        }
        count
    }
}
