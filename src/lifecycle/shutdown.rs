//! Shutdown coordination.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// Time allowed for all shutdown tasks together.
pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

type Task = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// Cleanup work run once the server has stopped.
#[derive(Default)]
pub struct ShutdownTasks {
    tasks: Vec<(&'static str, Task)>,
}

impl ShutdownTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.tasks.push((name, Box::pin(task)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every task concurrently under `deadline`.
    ///
    /// Returns `true` only if all tasks finished successfully in time.
    pub async fn run(self, deadline: Duration) -> bool {
        let mut set = JoinSet::new();
        for (name, task) in self.tasks {
            set.spawn(async move { (name, task.await) });
        }

        let drain = async {
            let mut clean = true;
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => tracing::debug!(task = name, "Shutdown task done"),
                    Ok((name, Err(e))) => {
                        tracing::error!(task = name, error = %e, "Shutdown task failed");
                        clean = false;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Shutdown task panicked");
                        clean = false;
                    }
                }
            }
            clean
        };

        match tokio::time::timeout(deadline, drain).await {
            Ok(clean) => clean,
            Err(_) => {
                tracing::error!(deadline = ?deadline, "Shutdown tasks exceeded deadline");
                false
            }
        }
    }
}

impl std::fmt::Debug for ShutdownTasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.tasks.iter().map(|(name, _)| *name).collect();
        f.debug_struct("ShutdownTasks").field("tasks", &names).finish()
    }
}
