//! Detached background tasks.
//!
//! Fire-and-forget side effects (analytics page views, first-time user
//! provisioning) run here, decoupled from the operation that triggered
//! them. A failing task is logged under its own name and never reaches the
//! caller of the primary operation.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use tokio::task::JoinSet;
use tracing::warn;

use crate::obs;

/// Set of detached tasks owned by one component.
///
/// Dropping the set aborts whatever is still running, so owners live for
/// the whole session and call [`BackgroundTasks::settle`] before shutdown.
pub struct BackgroundTasks {
    tasks: Mutex<JoinSet<()>>,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BackgroundTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTasks")
            .field("pending", &self.pending())
            .finish()
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn `task` detached. An `Err` result is logged as
    /// `background.failed` with `name`.
    pub fn spawn<F, E>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            if let Err(err) = task.await {
                obs::emit_background_failed(name, &err);
            }
        });
    }

    /// Number of tasks not yet joined.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Wait for every task spawned so far. Tasks spawned while settling are
    /// left for the next call.
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(&mut *self.lock());
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                warn!(event = "background.panicked", error = %err);
            }
        }
    }
}
