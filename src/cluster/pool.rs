//! Bounded worker pool for fan-out/join phases

use futures_util::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

/// How a pooled task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Completed(T),
    TimedOut,
    Cancelled,
}

impl<T> TaskOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            TaskOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Worker pool sized to the replica count and reused across calls.
///
/// Each task carries an optional deadline plus the pool-wide cancellation
/// signal. Clones share permits and the signal.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
    shutdown: Arc<watch::Sender<bool>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (shutdown, _) = watch::channel(false);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run `task` on the pool. The deadline covers queueing and execution.
    pub fn submit<F, T>(&self, deadline: Option<Duration>, task: F) -> JoinHandle<TaskOutcome<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = self.permits.clone();
        let shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let run = async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return TaskOutcome::Cancelled;
                };
                TaskOutcome::Completed(task.await)
            };

            let bounded = async move {
                match deadline {
                    Some(deadline) => tokio::time::timeout(deadline, run)
                        .await
                        .unwrap_or(TaskOutcome::TimedOut),
                    None => run.await,
                }
            };

            tokio::select! {
                outcome = bounded => outcome,
                _ = cancelled(shutdown) => TaskOutcome::Cancelled,
            }
        })
    }

    /// Submit every task and wait until all of them finish, time out or are cancelled.
    /// Outcomes come back in submission order.
    pub async fn fan_out<I, F, T>(&self, deadline: Option<Duration>, tasks: I) -> Vec<TaskOutcome<T>>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| self.submit(deadline, task))
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Pooled task failed: {}", e);
                    TaskOutcome::Cancelled
                }
            })
            .collect()
    }

    /// Fire and forget
    pub fn spawn_detached<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.submit(None, task));
    }

    /// Cancel queued and running tasks; later submissions are cancelled immediately.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        self.permits.close();
    }
}

async fn cancelled(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // Pool dropped without shutdown: let the task run to completion.
            std::future::pending::<()>().await;
        }
    }
}
