//! Bounded worker pool for probe tasks
//!
//! Every job is spawned up front; a semaphore with one permit per worker
//! limits how many run at once. Shutdown happens in two steps: `shutdown`
//! stops accepting jobs, `shutdown_now` aborts whatever is still queued or
//! running and waits until none of it can run any more.
//!
//! Interrupts are a generation counter on a `watch` channel. A wait started
//! at generation `epoch` counts as interrupted as soon as the counter moves
//! past it, so an interrupt raised before the wait began is never lost.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::DiscoveryError;

/// How a wait for pool termination ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Termination {
    /// Every job finished
    #[default]
    Completed,
    /// The wait ran out with jobs still pending
    TimedOut,
    /// The wait was cut short by an interrupt
    Interrupted,
}

pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tasks: JoinSet<()>,
    workers: usize,
    accepting: bool,
}

impl WorkerPool {
    /// Create a pool running at most `workers` jobs concurrently
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            tasks: JoinSet::new(),
            workers,
            accepting: true,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Jobs submitted and not yet finished
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Queue a job; fails once the pool has been shut down
    pub fn execute<F>(&mut self, job: F) -> Result<(), DiscoveryError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.accepting {
            return Err(DiscoveryError::PoolShutdown);
        }

        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            // A closed semaphore means the pool was torn down before this job started
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            job.await;
        });
        Ok(())
    }

    /// Stop accepting new jobs; queued and running jobs continue
    pub fn shutdown(&mut self) {
        self.accepting = false;
    }

    /// Wait for all jobs to finish, at most `grace`, or until `interrupt` moves past `epoch`
    pub async fn await_termination(
        &mut self,
        grace: Duration,
        interrupt: &mut watch::Receiver<u64>,
        epoch: u64,
    ) -> Termination {
        let tasks = &mut self.tasks;
        let drain = async {
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    if e.is_panic() {
                        warn!(error = %e, "Probe task panicked");
                    }
                }
            }
        };

        tokio::select! {
            biased;
            drained = timeout(grace, drain) => match drained {
                Ok(()) => Termination::Completed,
                Err(_) => Termination::TimedOut,
            },
            _ = interrupted(interrupt, epoch) => Termination::Interrupted,
        }
    }

    /// Abort every remaining job, returning how many were abandoned.
    ///
    /// Returns only once every aborted task has stopped; a job blocked
    /// between await points runs up to its next one first.
    pub async fn shutdown_now(&mut self) -> usize {
        self.accepting = false;
        self.permits.close();
        let abandoned = self.tasks.len();
        if abandoned > 0 {
            debug!(abandoned, "Aborting outstanding probe tasks");
        }
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        abandoned
    }
}

/// Resolves once the interrupt generation differs from `epoch`
async fn interrupted(interrupt: &mut watch::Receiver<u64>, epoch: u64) {
    loop {
        let generation = *interrupt.borrow_and_update();
        if generation != epoch {
            return;
        }
        if interrupt.changed().await.is_err() {
            // Sender gone: nobody can interrupt any more
            std::future::pending::<()>().await;
        }
    }
}
