//! At-least-once work queue keyed by job id.
//!
//! The job id is the deduplication key: while an id is waiting, running, or
//! within its retention window after acknowledgement, enqueueing it again is
//! a no-op. That is what keeps a job to at most one worker run.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

use docket_core::JobId;
use docket_retrieval::WorkItem;

pub use in_memory::InMemoryWorkQueue;
#[cfg(feature = "redis")]
pub use self::redis::RedisWorkQueue;

#[derive(Debug, Error)]
pub enum WorkQueueError {
    /// No command reached the backend; safe to retry.
    #[error("work queue unavailable: {0}")]
    Unavailable(String),
    #[error("work queue backend error: {0}")]
    Backend(String),
    #[error("work item serialization failed: {0}")]
    Serialization(String),
}

impl WorkQueueError {
    pub fn is_transient(&self) -> bool {
        matches!(self, WorkQueueError::Unavailable(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// The id is already known; nothing was added.
    AlreadyQueued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Already picked up, finished, or never queued.
    NotQueued,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, item: WorkItem) -> Result<EnqueueOutcome, WorkQueueError>;

    /// Claim the oldest waiting item, if any.
    async fn dequeue(&self) -> Result<Option<WorkItem>, WorkQueueError>;

    /// Mark a claimed item finished. Its payload (credentials) is dropped; the
    /// id keeps deduplicating for the retention window.
    async fn ack(&self, job_id: JobId) -> Result<(), WorkQueueError>;

    /// Hand a claimed item back to the head of the waiting list, payload
    /// intact, so the next `dequeue` picks it up again. No-op unless claimed.
    async fn release(&self, job_id: JobId) -> Result<(), WorkQueueError>;

    /// Best-effort removal of an item that has not been claimed yet.
    async fn remove(&self, job_id: JobId) -> Result<RemoveOutcome, WorkQueueError>;
}
