//! Worker side of the job contract.
//!
//! [`JobReporter`] is what a retrieval implementation uses to report progress,
//! wait for a two-factor code and notice cancellation. [`WorkerRunner`] pulls
//! work items and drives a pluggable [`RetrievalHandler`].

pub mod reporter;
pub mod runner;

use thiserror::Error;

use docket_retrieval::UpdateRejected;

use crate::job_store::JobStoreError;
use crate::queue::WorkQueueError;
use crate::signals::SignalStoreError;

pub use reporter::JobReporter;
pub use runner::{RetrievalHandler, WorkerConfig, WorkerHandle, WorkerRunner};

#[derive(Debug, Error)]
pub enum WorkerError {
    /// The job was cancelled; stop without further writes.
    #[error("job was cancelled")]
    Cancelled,
    #[error("timed out waiting for a two-factor code")]
    TwoFactorTimeout,
    #[error("job update rejected: {0}")]
    Rejected(UpdateRejected),
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error(transparent)]
    Store(#[from] JobStoreError),
    #[error(transparent)]
    Signals(#[from] SignalStoreError),
    #[error(transparent)]
    Queue(#[from] WorkQueueError),
}

impl WorkerError {
    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::Retrieval(msg.into())
    }
}
