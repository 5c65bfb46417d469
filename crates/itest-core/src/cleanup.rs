//! Reverse-order teardown of harness resources.
//!
//! Resources register an async teardown action when they are created.
//! [`CleanupStack::run`] executes the actions newest-first, so a container is
//! removed before the network it is attached to.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use tracing::{debug, error};

type CleanupFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// LIFO list of pending teardown actions.
#[derive(Default)]
pub struct CleanupStack {
    actions: Mutex<Vec<(String, CleanupFuture)>>,
}

impl CleanupStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `action` to run during [`run`](Self::run).
    ///
    /// The future is not polled until then.
    pub fn defer<F>(&self, name: impl Into<String>, action: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.lock().push((name.into(), Box::pin(action)));
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Runs all pending actions, most recently registered first.
    ///
    /// Failures are logged and do not stop the remaining actions. Calling
    /// `run` again only executes actions registered since the last call.
    pub async fn run(&self) {
        let actions = std::mem::take(&mut *self.lock());
        for (name, action) in actions.into_iter().rev() {
            match action.await {
                Ok(()) => debug!(cleanup = %name, "cleanup finished"),
                Err(e) => error!(cleanup = %name, error = %e, "cleanup failed"),
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, CleanupFuture)>> {
        self.actions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for CleanupStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.lock().iter().map(|(n, _)| n.clone()).collect();
        f.debug_struct("CleanupStack").field("pending", &names).finish()
    }
}
