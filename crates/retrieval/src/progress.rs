use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::status::JobStatus;

/// Ephemeral status + percentage published by the worker.
///
/// Absence of a snapshot means the job has not started; readers fall back to
/// [`ProgressSnapshot::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: JobStatus,
    pub progress: u8,
}

impl ProgressSnapshot {
    pub fn new(status: JobStatus, progress: u8) -> Self {
        Self {
            status,
            progress: progress.min(100),
        }
    }

    pub fn from_job(job: &Job) -> Self {
        Self::new(job.status, job.progress)
    }
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            status: JobStatus::Pending,
            progress: 0,
        }
    }
}
