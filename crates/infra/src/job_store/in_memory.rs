use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use docket_core::{JobId, UserId};
use docket_retrieval::{AuditRecord, Job, JobUpdate};

use super::{Admission, JobPage, JobStore, JobStoreError, Page, UpdateOutcome};

/// In-memory job store.
///
/// Backs tests and single-process development. Admission runs under a single
/// write lock, so concurrent submissions from one user serialise.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    audit: RwLock<Vec<AuditRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> JobStoreError {
    JobStoreError::Storage("lock poisoned".to_string())
}

fn active_count(jobs: &HashMap<JobId, Job>, user_id: UserId) -> u32 {
    jobs.values()
        .filter(|j| j.user_id == user_id && j.status.is_active())
        .count() as u32
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert_admitted(&self, job: Job, max_active: u32) -> Result<Admission, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;

        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }

        let active = active_count(&jobs, job.user_id);
        if active >= max_active {
            return Ok(Admission::Rejected { active });
        }

        jobs.insert(job.id, job.clone());
        Ok(Admission::Admitted(job))
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let jobs = self.jobs.read().map_err(|_| poisoned())?;
        Ok(jobs.get(&job_id).cloned())
    }

    async fn list_by_user(&self, user_id: UserId, page: Page) -> Result<JobPage, JobStoreError> {
        let jobs = self.jobs.read().map_err(|_| poisoned())?;

        let mut owned: Vec<&Job> = jobs.values().filter(|j| j.user_id == user_id).collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = owned.len() as u64;
        let jobs = owned
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .cloned()
            .collect();

        Ok(JobPage { jobs, total })
    }

    async fn count_active_by_user(&self, user_id: UserId) -> Result<u32, JobStoreError> {
        let jobs = self.jobs.read().map_err(|_| poisoned())?;
        Ok(active_count(&jobs, user_id))
    }

    async fn apply(
        &self,
        job_id: JobId,
        update: JobUpdate,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| poisoned())?;
        let job = jobs.get_mut(&job_id).ok_or(JobStoreError::NotFound(job_id))?;

        // Apply to a copy so a rejection leaves the stored record untouched.
        let mut next = job.clone();
        match next.apply(update, now) {
            Ok(()) => {
                *job = next.clone();
                Ok(UpdateOutcome::Applied(next))
            }
            Err(reason) => Ok(UpdateOutcome::Rejected {
                job: job.clone(),
                reason,
            }),
        }
    }

    async fn record_audit(&self, record: AuditRecord) -> Result<(), JobStoreError> {
        if !self.jobs.read().map_err(|_| poisoned())?.contains_key(&record.job_id) {
            return Err(JobStoreError::NotFound(record.job_id));
        }
        self.audit.write().map_err(|_| poisoned())?.push(record);
        Ok(())
    }

    async fn list_audit(&self, job_id: JobId) -> Result<Vec<AuditRecord>, JobStoreError> {
        let audit = self.audit.read().map_err(|_| poisoned())?;
        Ok(audit.iter().filter(|r| r.job_id == job_id).cloned().collect())
    }
}
