//! Durable job records.
//!
//! The store owns admission (count + insert as one atomic step) and applies
//! [`JobUpdate`]s through [`Job::apply`], so every backend enforces the same
//! lifecycle rules. Rejected updates are reported, not raised: writing to a
//! terminal job is an anomaly for the caller to log, never a storage failure.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use docket_core::{JobId, UserId};
use docket_retrieval::{AuditRecord, Job, JobUpdate, UpdateRejected};

pub use in_memory::InMemoryJobStore;
pub use postgres::PostgresJobStore;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("stored job is unreadable: {0}")]
    Corrupt(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl JobStoreError {
    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, JobStoreError::Storage(_))
    }
}

/// Result of an admission-controlled insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted(Job),
    /// The user already has `active` non-terminal jobs; nothing was written.
    Rejected { active: u32 },
}

/// Result of applying an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied(Job),
    /// The record is unchanged; `job` is its current state.
    Rejected { job: Job, reason: UpdateRejected },
}

/// Pagination window, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// Defaults to the first 20 jobs; `limit` is clamped to `1..=100`.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: u64,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert `job` only if its owner has fewer than `max_active` active jobs.
    async fn insert_admitted(&self, job: Job, max_active: u32) -> Result<Admission, JobStoreError>;

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    async fn list_by_user(&self, user_id: UserId, page: Page) -> Result<JobPage, JobStoreError>;

    async fn count_active_by_user(&self, user_id: UserId) -> Result<u32, JobStoreError>;

    async fn apply(
        &self,
        job_id: JobId,
        update: JobUpdate,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, JobStoreError>;

    async fn record_audit(&self, record: AuditRecord) -> Result<(), JobStoreError>;

    /// Audit rows of one job, oldest first.
    async fn list_audit(&self, job_id: JobId) -> Result<Vec<AuditRecord>, JobStoreError>;
}
