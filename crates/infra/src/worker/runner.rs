//! Queue consumer that drives retrievals.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use docket_core::JobId;
use docket_retrieval::WorkItem;

use super::{JobReporter, WorkerError};
use crate::job_store::JobStore;
use crate::queue::WorkQueue;
use crate::signals::JobSignals;

/// The document-source protocol client.
///
/// Implementations log in with the item's credentials, walk the requested
/// processes and report through `reporter`. Returning `Ok` completes the job;
/// returning an error fails it, except `WorkerError::Cancelled`.
#[async_trait]
pub trait RetrievalHandler: Send + Sync {
    async fn run(&self, item: WorkItem, reporter: &JobReporter) -> Result<(), WorkerError>;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            name: "retrieval-worker".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Handle to a spawned worker loop.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Stop after the item in progress (if any) and wait for the loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.join.await {
            error!(error = %err, "worker task ended abnormally");
        }
    }
}

#[derive(Clone)]
pub struct WorkerRunner {
    store: Arc<dyn JobStore>,
    signals: JobSignals,
    queue: Arc<dyn WorkQueue>,
    handler: Arc<dyn RetrievalHandler>,
    config: WorkerConfig,
}

impl WorkerRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        signals: JobSignals,
        queue: Arc<dyn WorkQueue>,
        handler: Arc<dyn RetrievalHandler>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            signals,
            queue,
            handler,
            config,
        }
    }

    /// Claim and process at most one item. Returns whether an item was claimed.
    ///
    /// If the job cannot be looked up the item is released back to the queue
    /// before the error is returned, so a later iteration picks it up again.
    pub async fn run_once(&self) -> Result<bool, WorkerError> {
        let Some(item) = self.queue.dequeue().await? else {
            return Ok(false);
        };
        let job_id = item.job_id;

        let runnable = match self.should_run(job_id).await {
            Ok(runnable) => runnable,
            Err(err) => {
                if let Err(release_err) = self.queue.release(job_id).await {
                    error!(
                        worker = %self.config.name,
                        job_id = %job_id,
                        error = %release_err,
                        "could not release work item"
                    );
                }
                return Err(err);
            }
        };

        if runnable {
            self.process(item).await;
        }

        self.queue.ack(job_id).await?;
        Ok(true)
    }

    async fn should_run(&self, job_id: JobId) -> Result<bool, WorkerError> {
        match self.store.get(job_id).await? {
            None => {
                warn!(worker = %self.config.name, job_id = %job_id, "work item for unknown job");
                Ok(false)
            }
            Some(job) if job.status.is_terminal() => {
                info!(worker = %self.config.name, job_id = %job_id, status = %job.status, "skipping finished job");
                Ok(false)
            }
            Some(_) => {
                let cancelled = self.signals.is_cancelled(job_id).await?;
                if cancelled {
                    info!(worker = %self.config.name, job_id = %job_id, "skipping cancelled job");
                }
                Ok(!cancelled)
            }
        }
    }

    async fn process(&self, item: WorkItem) {
        let job_id = item.job_id;
        let reporter = JobReporter::new(job_id, self.store.clone(), self.signals.clone());
        info!(worker = %self.config.name, job_id = %job_id, mode = %item.params.mode(), "retrieval started");

        let outcome = self.handler.run(item, &reporter).await;

        let finalized = match outcome {
            Ok(()) => self.finalize(&reporter, None).await,
            Err(WorkerError::Cancelled) => {
                info!(worker = %self.config.name, job_id = %job_id, "retrieval stopped by cancellation");
                Ok(())
            }
            Err(err) => {
                warn!(worker = %self.config.name, job_id = %job_id, error = %err, "retrieval failed");
                self.finalize(&reporter, Some(err.to_string())).await
            }
        };

        if let Err(err) = finalized {
            error!(worker = %self.config.name, job_id = %job_id, error = %err, "could not finalize job");
        }
    }

    /// Complete or fail the job unless the handler already finished it.
    async fn finalize(&self, reporter: &JobReporter, failure: Option<String>) -> Result<(), WorkerError> {
        let already_done = self
            .store
            .get(reporter.job_id())
            .await?
            .is_none_or(|job| job.status.is_terminal());
        if already_done {
            return Ok(());
        }

        let result = match failure {
            None => reporter.complete().await,
            Some(reason) => reporter.fail(reason).await,
        };
        match result {
            Ok(job) => {
                info!(worker = %self.config.name, job_id = %job.id, status = %job.status, "job finalized");
                Ok(())
            }
            Err(WorkerError::Cancelled) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Run the poll loop on the current runtime until the handle is shut down.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown, mut stop) = watch::channel(false);
        let join = tokio::spawn(async move {
            info!(worker = %self.config.name, "worker started");
            while !*stop.borrow() {
                let idle = match self.run_once().await {
                    Ok(claimed) => !claimed,
                    Err(err) => {
                        error!(worker = %self.config.name, error = %err, "worker iteration failed");
                        true
                    }
                };
                if idle {
                    tokio::select! {
                        _ = stop.changed() => {}
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
            }
            debug!(worker = %self.config.name, "worker stopped");
        });
        WorkerHandle { shutdown, join }
    }
}
