//! Job orchestration: admission, lifecycle commands and ownership-checked reads.
//!
//! The orchestrator never waits on a worker. Every operation is a handful of
//! store, queue and signal calls, safe to interleave with any other operation.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use docket_core::{JobId, UserId};
use docket_retrieval::{
    AuditRecord, CreateJobRequest, ErrorDescriptor, FileDescriptor, Job, JobError, JobStatus,
    JobUpdate, ProgressSnapshot, TwoFactorCode, WorkItem,
};

use crate::config::OrchestratorConfig;
use crate::job_store::{Admission, JobPage, JobStore, JobStoreError, Page, UpdateOutcome};
use crate::queue::{EnqueueOutcome, RemoveOutcome, WorkQueue, WorkQueueError};
use crate::signals::{JobSignals, SignalStoreError};

/// Failure of an orchestration call.
///
/// Only `Job` is caller-facing; the rest are infrastructure faults that the
/// boundary reports as a generic internal error.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("job store failure: {0}")]
    Store(#[from] JobStoreError),
    #[error("signal store failure: {0}")]
    Signals(#[from] SignalStoreError),
    #[error("work queue failure: {0}")]
    Queue(#[from] WorkQueueError),
}

impl OrchestrationError {
    pub fn code(&self) -> &'static str {
        match self {
            OrchestrationError::Job(e) => e.code(),
            _ => "INTERNAL_ERROR",
        }
    }

    pub fn as_job_error(&self) -> Option<&JobError> {
        match self {
            OrchestrationError::Job(e) => Some(e),
            _ => None,
        }
    }
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

#[derive(Clone)]
pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    signals: JobSignals,
    queue: Arc<dyn WorkQueue>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for JobOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        signals: JobSignals,
        queue: Arc<dyn WorkQueue>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            signals,
            queue,
            config,
        }
    }

    /// Validate, admit, persist and enqueue a new job.
    ///
    /// Nothing is written unless validation and admission both pass. The
    /// returned job never carries credentials.
    #[instrument(skip(self, requested_by, request), fields(user_id = %user_id), err)]
    pub async fn create_job(
        &self,
        user_id: UserId,
        requested_by: &str,
        request: CreateJobRequest,
    ) -> OrchestrationResult<Job> {
        let validated = request.validate()?;
        let max = self.config.max_active_jobs_per_user;

        let job = Job::new(
            JobId::new(),
            user_id,
            requested_by,
            validated.params,
            validated.profile,
            Utc::now(),
        );

        let job = match self.store.insert_admitted(job, max).await? {
            Admission::Admitted(job) => job,
            Admission::Rejected { active } => {
                info!(user_id = %user_id, active, max, "job rejected by admission control");
                return Err(JobError::LimitExceeded { active, max }.into());
            }
        };

        let item = WorkItem::for_job(&job, validated.credentials);
        match self.queue.enqueue(item).await {
            Ok(EnqueueOutcome::Queued) => {}
            Ok(EnqueueOutcome::AlreadyQueued) => {
                warn!(job_id = %job.id, "fresh job id was already queued");
            }
            Err(err) => {
                error!(job_id = %job.id, error = %err, "enqueue failed, failing job");
                self.fail_unqueued(job.id, &err).await;
                return Err(err.into());
            }
        }

        info!(job_id = %job.id, user_id = %user_id, mode = %job.mode(), "job created");
        Ok(job)
    }

    /// Mark a job that never reached the queue as failed so it stops counting
    /// against admission.
    async fn fail_unqueued(&self, job_id: JobId, cause: &WorkQueueError) {
        let now = Utc::now();
        let updates = [
            JobUpdate::ErrorRecorded(ErrorDescriptor::new(
                format!("could not be queued: {cause}"),
                now,
            )),
            JobUpdate::Advance {
                status: JobStatus::Failed,
                progress: None,
            },
        ];
        for update in updates {
            if let Err(err) = self.store.apply(job_id, update, now).await {
                error!(job_id = %job_id, error = %err, "could not fail unqueued job");
                return;
            }
        }
    }

    /// Fetch a job owned by `user_id`. Foreign jobs read as absent.
    pub async fn get_job(&self, job_id: JobId, user_id: UserId) -> OrchestrationResult<Job> {
        match self.store.get(job_id).await? {
            Some(job) if job.is_owned_by(user_id) => Ok(job),
            _ => Err(JobError::NotFound.into()),
        }
    }

    pub async fn list_jobs(&self, user_id: UserId, page: Page) -> OrchestrationResult<JobPage> {
        Ok(self.store.list_by_user(user_id, page).await?)
    }

    /// Relay a two-factor code to the worker waiting on this job.
    ///
    /// Does not change the job status; the worker advances once it consumes
    /// the code.
    #[instrument(skip(self, code), fields(job_id = %job_id, user_id = %user_id), err)]
    pub async fn submit_two_factor(
        &self,
        job_id: JobId,
        user_id: UserId,
        code: &str,
    ) -> OrchestrationResult<()> {
        let job = self.get_job(job_id, user_id).await?;
        if job.status != JobStatus::AwaitingTwoFactor {
            return Err(JobError::invalid_state("submit a two-factor code for", job.status).into());
        }
        let code = TwoFactorCode::parse(code)?;

        self.signals.submit_two_factor(job_id, &code).await?;
        info!(job_id = %job_id, "two-factor code relayed");
        Ok(())
    }

    /// Cancel a job that is still in a cancellable state.
    ///
    /// Order: raise the flag, pull the item off the queue if nobody claimed
    /// it, then persist `cancelled`. A worker mid-unit may finish that unit,
    /// but the caller-visible state is terminal once this returns.
    #[instrument(skip(self), fields(job_id = %job_id, user_id = %user_id), err)]
    pub async fn cancel_job(&self, job_id: JobId, user_id: UserId) -> OrchestrationResult<Job> {
        let job = self.get_job(job_id, user_id).await?;
        if !job.status.is_cancellable() {
            return Err(JobError::invalid_state("cancel", job.status).into());
        }

        self.signals.request_cancellation(job_id).await?;

        match self.queue.remove(job_id).await {
            Ok(RemoveOutcome::Removed) => info!(job_id = %job_id, "removed unclaimed work item"),
            Ok(RemoveOutcome::NotQueued) => {}
            Err(err) => warn!(job_id = %job_id, error = %err, "advisory queue removal failed"),
        }

        match self.store.apply(job_id, JobUpdate::Cancel, Utc::now()).await? {
            UpdateOutcome::Applied(job) => {
                let snapshot = ProgressSnapshot::from_job(&job);
                if let Err(err) = self.signals.publish_progress(job_id, snapshot).await {
                    warn!(job_id = %job_id, error = %err, "could not publish cancelled snapshot");
                }
                info!(job_id = %job_id, "job cancelled");
                Ok(job)
            }
            UpdateOutcome::Rejected { job, reason } => {
                warn!(
                    job_id = %job_id,
                    status = %job.status,
                    reason = %reason,
                    "cancel lost the race with the worker"
                );
                if let Err(err) = self.signals.clear_cancellation(job_id).await {
                    error!(job_id = %job_id, error = %err, "could not withdraw cancellation flag");
                }
                Err(JobError::invalid_state("cancel", job.status).into())
            }
        }
    }

    /// Latest progress, falling back to the job record when no snapshot exists
    /// (a job that has not started reads as `pending`, 0%).
    ///
    /// A terminal record always wins over the snapshot: a worker write racing
    /// a cancel may republish a stale status after the job was closed.
    pub async fn get_progress(
        &self,
        job_id: JobId,
        user_id: UserId,
    ) -> OrchestrationResult<ProgressSnapshot> {
        let job = self.get_job(job_id, user_id).await?;
        if job.status.is_terminal() {
            return Ok(ProgressSnapshot::from_job(&job));
        }
        let snapshot = self.signals.progress(job_id).await?;
        Ok(snapshot.unwrap_or_else(|| ProgressSnapshot::from_job(&job)))
    }

    pub async fn get_files(
        &self,
        job_id: JobId,
        user_id: UserId,
    ) -> OrchestrationResult<Vec<FileDescriptor>> {
        Ok(self.get_job(job_id, user_id).await?.files)
    }

    pub async fn get_audit(
        &self,
        job_id: JobId,
        user_id: UserId,
    ) -> OrchestrationResult<Vec<AuditRecord>> {
        self.get_job(job_id, user_id).await?;
        Ok(self.store.list_audit(job_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use docket_retrieval::Credentials;

    use super::*;
    use crate::job_store::InMemoryJobStore;
    use crate::queue::InMemoryWorkQueue;
    use crate::signals::{InMemorySignalStore, SignalTtls};

    const VALID_NUMBER: &str = "1234567-12.2024.8.01.0001";

    struct Harness {
        orchestrator: JobOrchestrator,
        store: Arc<InMemoryJobStore>,
        queue: Arc<InMemoryWorkQueue>,
        signals: JobSignals,
    }

    fn harness(max_active: u32) -> Harness {
        let store = Arc::new(InMemoryJobStore::new());
        let queue = Arc::new(InMemoryWorkQueue::default());
        let signals = JobSignals::new(Arc::new(InMemorySignalStore::new()), SignalTtls::default());
        let orchestrator = JobOrchestrator::new(
            store.clone(),
            signals.clone(),
            queue.clone(),
            OrchestratorConfig {
                max_active_jobs_per_user: max_active,
            },
        );
        Harness {
            orchestrator,
            store,
            queue,
            signals,
        }
    }

    fn by_number(numbers: &[&str]) -> CreateJobRequest {
        CreateJobRequest {
            mode: Some("by_number".to_string()),
            credentials: Some(Credentials::new("12345678900", "hunter2")),
            process_numbers: numbers.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    async fn move_to(h: &Harness, job_id: JobId, status: JobStatus) {
        let outcome = h
            .store
            .apply(job_id, JobUpdate::Advance { status, progress: None }, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Applied(_)));
    }

    fn job_error(err: OrchestrationError) -> JobError {
        match err {
            OrchestrationError::Job(e) => e,
            other => panic!("expected a job error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_persists_pending_job_and_enqueues_credentials() {
        let h = harness(3);
        let user = UserId::new();
        let job = h
            .orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.user_id, user);

        let item = h.queue.dequeue().await.unwrap().expect("work item queued");
        assert_eq!(item.job_id, job.id);
        assert_eq!(item.credentials, Credentials::new("12345678900", "hunter2"));
        assert_eq!(item.requested_by, "Ana");
    }

    #[tokio::test]
    async fn invalid_number_is_named_and_nothing_is_written() {
        let h = harness(3);
        let user = UserId::new();
        let err = h
            .orchestrator
            .create_job(user, "Ana", by_number(&["bad-number"]))
            .await
            .unwrap_err();

        assert_eq!(
            job_error(err),
            JobError::InvalidProcessNumber("bad-number".to_string())
        );
        assert_eq!(h.store.count_active_by_user(user).await.unwrap(), 0);
        assert_eq!(h.queue.waiting_len(), 0);
    }

    #[tokio::test]
    async fn admission_limit_rejects_without_new_row() {
        let h = harness(2);
        let user = UserId::new();
        for _ in 0..2 {
            h.orchestrator
                .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
                .await
                .unwrap();
        }

        let err = h
            .orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap_err();
        assert_eq!(job_error(err), JobError::LimitExceeded { active: 2, max: 2 });

        let page = h.orchestrator.list_jobs(user, Page::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(h.queue.waiting_len(), 2);
    }

    #[tokio::test]
    async fn foreign_jobs_read_as_not_found_everywhere() {
        let h = harness(3);
        let (owner, stranger) = (UserId::new(), UserId::new());
        let job = h
            .orchestrator
            .create_job(owner, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap();
        move_to(&h, job.id, JobStatus::AwaitingTwoFactor).await;

        let o = &h.orchestrator;
        let results = [
            o.get_job(job.id, stranger).await.map(|_| ()),
            o.get_progress(job.id, stranger).await.map(|_| ()),
            o.get_files(job.id, stranger).await.map(|_| ()),
            o.get_audit(job.id, stranger).await.map(|_| ()),
            o.submit_two_factor(job.id, stranger, "123456").await,
            o.cancel_job(job.id, stranger).await.map(|_| ()),
        ];
        for result in results {
            assert_eq!(job_error(result.unwrap_err()), JobError::NotFound);
        }

        assert_eq!(o.get_job(job.id, owner).await.unwrap().status, JobStatus::AwaitingTwoFactor);
        assert!(!h.signals.is_cancelled(job.id).await.unwrap());
    }

    #[tokio::test]
    async fn progress_defaults_to_pending_zero_before_start() {
        let h = harness(3);
        let user = UserId::new();
        let job = h
            .orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap();

        assert_eq!(
            h.orchestrator.get_progress(job.id, user).await.unwrap(),
            ProgressSnapshot::default()
        );

        let snapshot = ProgressSnapshot::new(JobStatus::Downloading, 45);
        h.signals.publish_progress(job.id, snapshot).await.unwrap();
        assert_eq!(h.orchestrator.get_progress(job.id, user).await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn two_factor_requires_awaiting_state_then_valid_code() {
        let h = harness(3);
        let user = UserId::new();
        let job = h
            .orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap();
        move_to(&h, job.id, JobStatus::Processing).await;

        let err = h
            .orchestrator
            .submit_two_factor(job.id, user, "654321")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");

        let other = h
            .orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap();
        move_to(&h, other.id, JobStatus::AwaitingTwoFactor).await;

        for bad in ["12345", "1234567", "12a456"] {
            let err = h
                .orchestrator
                .submit_two_factor(other.id, user, bad)
                .await
                .unwrap_err();
            assert_eq!(job_error(err), JobError::InvalidCode, "{bad}");
        }

        h.orchestrator
            .submit_two_factor(other.id, user, "654321")
            .await
            .unwrap();
        let code = h.signals.take_two_factor(other.id).await.unwrap().unwrap();
        assert_eq!(code.as_str(), "654321");
        assert_eq!(
            h.orchestrator.get_job(other.id, user).await.unwrap().status,
            JobStatus::AwaitingTwoFactor
        );
    }

    #[tokio::test]
    async fn cancel_pending_job_removes_it_from_queue() {
        let h = harness(3);
        let user = UserId::new();
        let job = h
            .orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap();

        let cancelled = h.orchestrator.cancel_job(job.id, user).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());
        assert!(h.signals.is_cancelled(job.id).await.unwrap());
        assert_eq!(h.queue.dequeue().await.unwrap(), None);

        let progress = h.orchestrator.get_progress(job.id, user).await.unwrap();
        assert_eq!(progress.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_downloading_job_is_terminal_despite_worker_writes() {
        let h = harness(3);
        let user = UserId::new();
        let job = h
            .orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap();
        h.queue.dequeue().await.unwrap();
        move_to(&h, job.id, JobStatus::Downloading).await;

        h.orchestrator.cancel_job(job.id, user).await.unwrap();

        // A racing worker write after the cancel is rejected.
        let late = h
            .store
            .apply(
                job.id,
                JobUpdate::Advance { status: JobStatus::Processing, progress: Some(80) },
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(matches!(late, UpdateOutcome::Rejected { .. }));
        assert_eq!(
            h.orchestrator.get_job(job.id, user).await.unwrap().status,
            JobStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn cancel_is_refused_outside_cancellable_states() {
        let h = harness(10);
        let user = UserId::new();
        for status in [
            JobStatus::CheckingIntegrity,
            JobStatus::Retrying,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            let job = h
                .orchestrator
                .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
                .await
                .unwrap();
            move_to(&h, job.id, status).await;
            let err = h.orchestrator.cancel_job(job.id, user).await.unwrap_err();
            assert_eq!(job_error(err), JobError::invalid_state("cancel", status));
            assert!(!h.signals.is_cancelled(job.id).await.unwrap());
        }

        let job = h
            .orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap();
        h.orchestrator.cancel_job(job.id, user).await.unwrap();
        let err = h.orchestrator.cancel_job(job.id, user).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[tokio::test]
    async fn files_and_audit_are_returned_to_owner() {
        let h = harness(3);
        let user = UserId::new();
        let job = h
            .orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap();
        let file = FileDescriptor {
            name: "peticao.pdf".to_string(),
            process_number: Some(VALID_NUMBER.to_string()),
            storage_key: "jobs/peticao.pdf".to_string(),
            size_bytes: Some(2048),
            retrieved_at: Utc::now(),
        };
        h.store
            .apply(job.id, JobUpdate::ProcessSucceeded { files: vec![file.clone()] }, Utc::now())
            .await
            .unwrap();
        h.store.record_audit(AuditRecord::for_file(job.id, &file)).await.unwrap();

        assert_eq!(h.orchestrator.get_files(job.id, user).await.unwrap(), vec![file]);
        let audit = h.orchestrator.get_audit(job.id, user).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].file_name, "peticao.pdf");
    }

    #[tokio::test]
    async fn progress_of_cancelled_job_ignores_late_worker_snapshot() {
        let h = harness(3);
        let user = UserId::new();
        let job = h
            .orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap();
        move_to(&h, job.id, JobStatus::Downloading).await;
        h.orchestrator.cancel_job(job.id, user).await.unwrap();

        let late = ProgressSnapshot::new(JobStatus::Downloading, 40);
        h.signals.publish_progress(job.id, late).await.unwrap();

        let progress = h.orchestrator.get_progress(job.id, user).await.unwrap();
        assert_eq!(progress.status, JobStatus::Cancelled);
    }

    /// Serves the record as it was, then lets the worker move it on before
    /// the caller gets to write.
    struct WorkerOvertakesRead {
        inner: Arc<InMemoryJobStore>,
        next: std::sync::Mutex<Option<JobStatus>>,
    }

    #[async_trait]
    impl JobStore for WorkerOvertakesRead {
        async fn insert_admitted(&self, job: Job, max_active: u32) -> Result<Admission, JobStoreError> {
            self.inner.insert_admitted(job, max_active).await
        }
        async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
            let seen = self.inner.get(job_id).await?;
            let next = self.next.lock().unwrap().take();
            if let Some(status) = next {
                self.inner
                    .apply(job_id, JobUpdate::Advance { status, progress: None }, Utc::now())
                    .await?;
            }
            Ok(seen)
        }
        async fn list_by_user(&self, user_id: UserId, page: Page) -> Result<JobPage, JobStoreError> {
            self.inner.list_by_user(user_id, page).await
        }
        async fn count_active_by_user(&self, user_id: UserId) -> Result<u32, JobStoreError> {
            self.inner.count_active_by_user(user_id).await
        }
        async fn apply(
            &self,
            job_id: JobId,
            update: JobUpdate,
            now: chrono::DateTime<Utc>,
        ) -> Result<UpdateOutcome, JobStoreError> {
            self.inner.apply(job_id, update, now).await
        }
        async fn record_audit(&self, record: AuditRecord) -> Result<(), JobStoreError> {
            self.inner.record_audit(record).await
        }
        async fn list_audit(&self, job_id: JobId) -> Result<Vec<AuditRecord>, JobStoreError> {
            self.inner.list_audit(job_id).await
        }
    }

    #[tokio::test]
    async fn cancel_loses_to_worker_reaching_integrity_check() {
        let inner = Arc::new(InMemoryJobStore::new());
        let racing = Arc::new(WorkerOvertakesRead {
            inner: inner.clone(),
            next: std::sync::Mutex::new(None),
        });
        let signals = JobSignals::new(Arc::new(InMemorySignalStore::new()), SignalTtls::default());
        let orchestrator = JobOrchestrator::new(
            racing.clone(),
            signals.clone(),
            Arc::new(InMemoryWorkQueue::default()),
            OrchestratorConfig {
                max_active_jobs_per_user: 3,
            },
        );
        let user = UserId::new();
        let job = orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap();
        inner
            .apply(
                job.id,
                JobUpdate::Advance { status: JobStatus::Downloading, progress: Some(60) },
                Utc::now(),
            )
            .await
            .unwrap();
        *racing.next.lock().unwrap() = Some(JobStatus::CheckingIntegrity);

        let err = orchestrator.cancel_job(job.id, user).await.unwrap_err();
        assert_eq!(
            job_error(err),
            JobError::invalid_state("cancel", JobStatus::CheckingIntegrity)
        );
        let stored = inner.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::CheckingIntegrity);
        assert!(stored.completed_at.is_none());
        assert!(!signals.is_cancelled(job.id).await.unwrap());
    }

    struct BrokenQueue;

    #[async_trait]
    impl WorkQueue for BrokenQueue {
        async fn enqueue(&self, _item: WorkItem) -> Result<EnqueueOutcome, WorkQueueError> {
            Err(WorkQueueError::Backend("connection refused".to_string()))
        }
        async fn dequeue(&self) -> Result<Option<WorkItem>, WorkQueueError> {
            Ok(None)
        }
        async fn ack(&self, _job_id: JobId) -> Result<(), WorkQueueError> {
            Ok(())
        }
        async fn release(&self, _job_id: JobId) -> Result<(), WorkQueueError> {
            Ok(())
        }
        async fn remove(&self, _job_id: JobId) -> Result<RemoveOutcome, WorkQueueError> {
            Ok(RemoveOutcome::NotQueued)
        }
    }

    #[tokio::test]
    async fn enqueue_failure_fails_the_job_and_frees_the_slot() {
        let store = Arc::new(InMemoryJobStore::new());
        let signals = JobSignals::new(Arc::new(InMemorySignalStore::new()), SignalTtls::default());
        let orchestrator = JobOrchestrator::new(
            store.clone(),
            signals,
            Arc::new(BrokenQueue),
            OrchestratorConfig {
                max_active_jobs_per_user: 1,
            },
        );
        let user = UserId::new();

        let err = orchestrator
            .create_job(user, "Ana", by_number(&[VALID_NUMBER]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Queue(_)));
        assert_eq!(err.code(), "INTERNAL_ERROR");

        let page = orchestrator.list_jobs(user, Page::default()).await.unwrap();
        assert_eq!(page.jobs.len(), 1);
        assert_eq!(page.jobs[0].status, JobStatus::Failed);
        assert_eq!(page.jobs[0].errors.len(), 1);
        assert_eq!(store.count_active_by_user(user).await.unwrap(), 0);
    }
}
