//! Bounded task pool with retry semantics
//!
//! This module provides the concurrency primitive the crawler drives: a
//! fixed number of workers pulling tasks from a shared queue, a per-attempt
//! timeout, an in-worker retry loop with a fixed delay, and a callback that
//! fires once a task has exhausted its retries. Tasks can submit further
//! tasks through the [`PoolHandle`] passed into every invocation, so the
//! pool drains only when no task is queued or running.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

/// Pool tuning knobs
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent workers
    pub concurrency: usize,

    /// Timeout applied to each attempt of a task
    pub task_timeout: Duration,

    /// How many times a failed task is retried before it is terminal
    pub retries: u32,

    /// Delay between a failed attempt and its retry
    pub retry_delay: Duration,

    /// Suppresses the per-completion progress line
    pub silent: bool,
}

/// Why a task attempt did not succeed
#[derive(Debug)]
pub enum PoolError<E> {
    /// The task function returned an error
    Task(E),

    /// The attempt exceeded the per-task timeout
    TimedOut { limit: Duration },
}

struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

/// Submission handle passed into every task invocation
///
/// Holds only a weak reference to the queue; once the pool is closed,
/// submissions are dropped with a warning instead of keeping it alive.
pub struct PoolHandle<T> {
    tx: mpsc::WeakUnboundedSender<T>,
    pending: Arc<Pending>,
}

impl<T> Clone for PoolHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<T> PoolHandle<T> {
    pub fn submit(&self, task: T) {
        match self.tx.upgrade() {
            Some(tx) => {
                self.pending.count.fetch_add(1, Ordering::SeqCst);
                // Send cannot fail while we hold an upgraded sender
                let _ = tx.send(task);
            }
            None => {
                tracing::warn!("task submitted after pool close, dropping it");
            }
        }
    }
}

/// A bounded pool of retrying workers
pub struct TaskPool<T> {
    tx: mpsc::UnboundedSender<T>,
    pending: Arc<Pending>,
    completed: Arc<AtomicUsize>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Clone + Send + 'static> TaskPool<T> {
    /// Starts the workers
    ///
    /// `run` executes one attempt of a task. `on_retry` fires before each
    /// retry of a failed attempt; `on_failure` fires exactly once per task
    /// whose retries are exhausted, with the outcome of the final attempt.
    pub fn new<E, F, Fut, R, C>(config: PoolConfig, run: F, on_retry: R, on_failure: C) -> Self
    where
        E: Send + 'static,
        F: Fn(T, PoolHandle<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        R: Fn(&T, &PoolError<E>, u32) + Send + Sync + 'static,
        C: Fn(T, PoolError<E>) + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<T>();
        let pending = Arc::new(Pending {
            count: AtomicUsize::new(0),
            idle: Notify::new(),
        });
        let completed = Arc::new(AtomicUsize::new(0));

        let queue = Arc::new(Mutex::new(rx));
        let run = Arc::new(run);
        let on_retry = Arc::new(on_retry);
        let on_failure = Arc::new(on_failure);
        let config = Arc::new(config);

        let mut workers = Vec::with_capacity(config.concurrency);
        for _ in 0..config.concurrency.max(1) {
            let queue = queue.clone();
            let handle = PoolHandle {
                tx: tx.downgrade(),
                pending: pending.clone(),
            };
            let run = run.clone();
            let on_retry = on_retry.clone();
            let on_failure = on_failure.clone();
            let pending = pending.clone();
            let completed = completed.clone();
            let config = config.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let task = { queue.lock().await.recv().await };
                    let Some(task) = task else { break };

                    let mut attempt: u32 = 0;
                    loop {
                        let outcome = tokio::time::timeout(
                            config.task_timeout,
                            (*run)(task.clone(), handle.clone()),
                        )
                        .await;

                        let failure = match outcome {
                            Ok(Ok(())) => break,
                            Ok(Err(e)) => PoolError::Task(e),
                            Err(_) => PoolError::TimedOut {
                                limit: config.task_timeout,
                            },
                        };

                        if attempt < config.retries {
                            attempt += 1;
                            (*on_retry)(&task, &failure, attempt);
                            tokio::time::sleep(config.retry_delay).await;
                        } else {
                            (*on_failure)(task, failure);
                            break;
                        }
                    }

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    let left = pending.count.fetch_sub(1, Ordering::SeqCst) - 1;
                    if !config.silent {
                        tracing::info!("processed {} task(s), {} pending", done, left);
                    }
                    if left == 0 {
                        pending.idle.notify_waiters();
                    }
                }
            }));
        }

        Self {
            tx,
            pending,
            completed,
            workers,
        }
    }

    /// Queues a task from outside the pool
    pub fn submit(&self, task: T) {
        self.pending.count.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send(task);
    }

    /// A submission handle for use inside tasks
    pub fn handle(&self) -> PoolHandle<T> {
        PoolHandle {
            tx: self.tx.downgrade(),
            pending: self.pending.clone(),
        }
    }

    /// Number of tasks that have finished, successfully or terminally
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Waits until no task is queued or running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.pending.idle.notified();
            tokio::pin!(notified);
            // Register interest before the check so a completion between the
            // check and the await cannot be missed
            notified.as_mut().enable();
            if self.pending.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Closes the queue and waits for the workers to exit
    pub async fn close(self) {
        drop(self.tx);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
