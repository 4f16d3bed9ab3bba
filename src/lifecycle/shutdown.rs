//! Shutdown coordination for background tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// Long-running tasks subscribe to the broadcast channel before they are
/// spawned and hand their `JoinHandle` to [`track`](Self::track);
/// [`drain`](Self::drain) signals them and waits until every one has exited.
///
/// `triggered` only changes under the `tasks` lock, so a handle is either
/// in the list when `drain` takes it or aborted by `track`.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            tasks: Mutex::new(Vec::new()),
            triggered: AtomicBool::new(false),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Send the shutdown signal to current subscribers.
    pub fn trigger(&self) {
        {
            let _tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            self.triggered.store(true, Ordering::SeqCst);
        }
        let _ = self.tx.send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Register a spawned task to be awaited by [`drain`](Self::drain).
    ///
    /// After shutdown was triggered the task is aborted instead and `false`
    /// is returned.
    pub fn track(&self, name: &'static str, handle: JoinHandle<()>) -> bool {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if self.triggered.load(Ordering::SeqCst) {
            handle.abort();
            tracing::debug!(task = name, "Shutdown already triggered, task aborted");
            return false;
        }
        tasks.push((name, handle));
        true
    }

    /// Number of tracked tasks not yet drained.
    pub fn tracked(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Trigger shutdown and await every tracked task. Returns how many were joined.
    pub async fn drain(&self) -> usize {
        self.trigger();
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));

        let count = tasks.len();
        for (name, handle) in tasks {
            if let Err(e) = handle.await {
                tracing::error!(task = name, error = %e, "Background task ended abnormally");
            } else {
                tracing::debug!(task = name, "Background task stopped");
            }
        }
        count
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
