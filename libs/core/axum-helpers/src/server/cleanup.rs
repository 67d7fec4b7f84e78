//! Connection cleanup run during graceful shutdown.

use tracing::{error, info};

/// Close a SeaORM connection, logging the outcome.
///
/// ```ignore
/// close_postgres(db, "catalog").await;
/// ```
pub async fn close_postgres(db: sea_orm::DatabaseConnection, name: &str) {
    match db.close().await {
        Ok(_) => info!("PostgreSQL connection '{}' closed successfully", name),
        Err(e) => error!("Error closing PostgreSQL connection '{}': {}", name, e),
    }
}

/// Runs named cleanup tasks concurrently and waits for all of them.
///
/// ```ignore
/// let mut cleanup = CleanupCoordinator::new();
/// cleanup.add_task("catalog", async move { close_postgres(db, "catalog").await });
/// cleanup.add_task("scheduler", async move { scheduler.shutdown().await });
/// cleanup.run().await;
/// ```
#[derive(Default)]
pub struct CleanupCoordinator {
    tasks: Vec<(&'static str, tokio::task::JoinHandle<()>)>,
}

impl CleanupCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` now and track it under `name`.
    pub fn add_task<F>(&mut self, name: &'static str, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.push((name, tokio::spawn(task)));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every task. A panicking task is logged and does not stop the rest.
    pub async fn run(self) {
        info!("Running {} cleanup tasks", self.tasks.len());

        for (name, handle) in self.tasks {
            match handle.await {
                Ok(_) => info!("Cleanup task '{}' completed successfully", name),
                Err(e) => error!("Cleanup task '{}' failed: {}", name, e),
            }
        }

        info!("All cleanup tasks completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_runs_every_task_even_after_a_panic() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut cleanup = CleanupCoordinator::new();

        let c = counter.clone();
        cleanup.add_task("first", async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        cleanup.add_task("broken", async { panic!("boom") });
        let c = counter.clone();
        cleanup.add_task("last", async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(cleanup.len(), 3);
        cleanup.run().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
