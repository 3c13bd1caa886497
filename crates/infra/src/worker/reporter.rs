use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use docket_core::JobId;
use docket_retrieval::{
    AuditRecord, ErrorDescriptor, FileDescriptor, Job, JobStatus, JobUpdate, ProgressSnapshot,
    TwoFactorCode,
};

use super::WorkerError;
use crate::job_store::{JobStore, UpdateOutcome};
use crate::signals::JobSignals;

/// Reports one job's progress and outcome, and relays its signals.
///
/// Every write first checks the cancellation flag, so a cancelled job sees at
/// most the unit of work already in flight.
#[derive(Clone)]
pub struct JobReporter {
    job_id: JobId,
    store: Arc<dyn JobStore>,
    signals: JobSignals,
}

impl std::fmt::Debug for JobReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobReporter")
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}

impl JobReporter {
    pub fn new(job_id: JobId, store: Arc<dyn JobStore>, signals: JobSignals) -> Self {
        Self {
            job_id,
            store,
            signals,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// `Err(Cancelled)` once a cancel was requested. Call between units of work.
    pub async fn checkpoint(&self) -> Result<(), WorkerError> {
        if self.signals.is_cancelled(self.job_id).await? {
            debug!(job_id = %self.job_id, "cancellation observed");
            return Err(WorkerError::Cancelled);
        }
        Ok(())
    }

    pub async fn advance(&self, status: JobStatus, progress: Option<u8>) -> Result<Job, WorkerError> {
        self.checkpoint().await?;
        self.write(JobUpdate::Advance { status, progress }).await
    }

    pub async fn progress(&self, progress: u8) -> Result<Job, WorkerError> {
        self.checkpoint().await?;
        self.write(JobUpdate::Progress(progress)).await
    }

    pub async fn set_total(&self, total: u32) -> Result<Job, WorkerError> {
        self.checkpoint().await?;
        self.write(JobUpdate::TotalProcesses(total)).await
    }

    /// Record one retrieved process: appends the file, bumps the success count
    /// and writes the audit row.
    pub async fn record_success(&self, file: FileDescriptor) -> Result<Job, WorkerError> {
        self.checkpoint().await?;
        let audit = AuditRecord::for_file(self.job_id, &file);
        let job = self
            .write(JobUpdate::ProcessSucceeded { files: vec![file] })
            .await?;
        self.store.record_audit(audit).await?;
        Ok(job)
    }

    pub async fn record_failure(&self, error: ErrorDescriptor) -> Result<Job, WorkerError> {
        self.checkpoint().await?;
        self.write(JobUpdate::ProcessFailed(error)).await
    }

    /// Move to `awaiting_2fa` and poll for the caller's code.
    ///
    /// The code is consumed on read. Gives up with `TwoFactorTimeout` after
    /// `timeout`, or `Cancelled` as soon as the flag is raised.
    pub async fn await_two_factor_code(
        &self,
        timeout: Duration,
        poll: Duration,
    ) -> Result<TwoFactorCode, WorkerError> {
        self.advance(JobStatus::AwaitingTwoFactor, None).await?;
        info!(job_id = %self.job_id, "waiting for two-factor code");

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            self.checkpoint().await?;
            if let Some(code) = self.signals.take_two_factor(self.job_id).await? {
                return Ok(code);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(WorkerError::TwoFactorTimeout);
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub async fn complete(&self) -> Result<Job, WorkerError> {
        self.write(JobUpdate::Advance {
            status: JobStatus::Completed,
            progress: Some(100),
        })
        .await
    }

    pub async fn fail(&self, reason: impl Into<String>) -> Result<Job, WorkerError> {
        self.write(JobUpdate::ErrorRecorded(ErrorDescriptor::new(reason, Utc::now())))
            .await?;
        self.write(JobUpdate::Advance {
            status: JobStatus::Failed,
            progress: None,
        })
        .await
    }

    async fn write(&self, update: JobUpdate) -> Result<Job, WorkerError> {
        match self.store.apply(self.job_id, update, Utc::now()).await? {
            UpdateOutcome::Applied(job) => {
                self.signals
                    .publish_progress(self.job_id, ProgressSnapshot::from_job(&job))
                    .await?;
                Ok(job)
            }
            UpdateOutcome::Rejected { job, .. } if job.status == JobStatus::Cancelled => {
                Err(WorkerError::Cancelled)
            }
            UpdateOutcome::Rejected { reason, .. } => Err(WorkerError::Rejected(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_store::{Admission, InMemoryJobStore};
    use crate::signals::{InMemorySignalStore, SignalTtls};
    use docket_core::UserId;
    use docket_retrieval::{RetrievalParams, UpdateRejected};

    async fn setup() -> (JobReporter, Arc<InMemoryJobStore>, JobSignals) {
        let store = Arc::new(InMemoryJobStore::new());
        let signals = JobSignals::new(Arc::new(InMemorySignalStore::new()), SignalTtls::default());
        let job = Job::new(
            JobId::new(),
            UserId::new(),
            "Ana",
            RetrievalParams::ByTask { task_name: "Minutar".to_string() },
            None,
            Utc::now(),
        );
        let Admission::Admitted(job) = store.insert_admitted(job, 5).await.unwrap() else {
            panic!("job should be admitted");
        };
        let reporter = JobReporter::new(job.id, store.clone(), signals.clone());
        (reporter, store, signals)
    }

    fn file(name: &str) -> FileDescriptor {
        FileDescriptor {
            name: name.to_string(),
            process_number: None,
            storage_key: format!("k/{name}"),
            size_bytes: None,
            retrieved_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn advance_updates_record_and_snapshot() {
        let (reporter, _store, signals) = setup().await;
        let job = reporter.advance(JobStatus::Processing, Some(30)).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.started_at.is_some());
        assert_eq!(
            signals.progress(reporter.job_id()).await.unwrap(),
            Some(ProgressSnapshot::new(JobStatus::Processing, 30))
        );
    }

    #[tokio::test]
    async fn success_writes_file_count_and_audit() {
        let (reporter, store, _signals) = setup().await;
        reporter.set_total(2).await.unwrap();
        let job = reporter.record_success(file("a.pdf")).await.unwrap();
        assert_eq!(job.success_count, 1);
        assert_eq!(job.files.len(), 1);
        assert_eq!(store.list_audit(reporter.job_id()).await.unwrap().len(), 1);

        let job = reporter
            .record_failure(ErrorDescriptor::for_process("x", "not found", Utc::now()))
            .await
            .unwrap();
        assert_eq!(job.failure_count, 1);

        assert!(matches!(
            reporter.record_success(file("c.pdf")).await,
            Err(WorkerError::Rejected(UpdateRejected::CountsExceedTotal { .. }))
        ));
    }

    #[tokio::test]
    async fn cancellation_stops_further_writes() {
        let (reporter, store, signals) = setup().await;
        reporter.advance(JobStatus::Downloading, Some(50)).await.unwrap();

        signals.request_cancellation(reporter.job_id()).await.unwrap();
        assert!(matches!(reporter.checkpoint().await, Err(WorkerError::Cancelled)));
        assert!(matches!(
            reporter.progress(70).await,
            Err(WorkerError::Cancelled)
        ));
        assert_eq!(store.get(reporter.job_id()).await.unwrap().unwrap().progress, 50);
    }

    #[tokio::test]
    async fn writes_after_cancelled_record_report_cancelled() {
        let (reporter, store, _signals) = setup().await;
        store
            .apply(reporter.job_id(), JobUpdate::Cancel, Utc::now())
            .await
            .unwrap();
        assert!(matches!(reporter.complete().await, Err(WorkerError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn two_factor_code_is_consumed_once() {
        let (reporter, store, signals) = setup().await;
        let code = TwoFactorCode::parse("112233").unwrap();
        signals.submit_two_factor(reporter.job_id(), &code).await.unwrap();

        let received = reporter
            .await_two_factor_code(Duration::from_secs(60), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(received, code);
        assert_eq!(
            store.get(reporter.job_id()).await.unwrap().unwrap().status,
            JobStatus::AwaitingTwoFactor
        );
        assert_eq!(signals.take_two_factor(reporter.job_id()).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn two_factor_wait_times_out() {
        let (reporter, _store, _signals) = setup().await;
        let result = reporter
            .await_two_factor_code(Duration::from_secs(10), Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(WorkerError::TwoFactorTimeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn two_factor_wait_ends_on_cancel() {
        let (reporter, _store, signals) = setup().await;
        let job_id = reporter.job_id();
        let waiter = tokio::spawn(async move {
            reporter
                .await_two_factor_code(Duration::from_secs(600), Duration::from_secs(1))
                .await
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        signals.request_cancellation(job_id).await.unwrap();

        assert!(matches!(waiter.await.unwrap(), Err(WorkerError::Cancelled)));
    }

    #[tokio::test]
    async fn fail_records_reason_and_terminates() {
        let (reporter, _store, signals) = setup().await;
        let job = reporter.fail("login rejected").await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.errors[0].message, "login rejected");
        assert_eq!(
            signals.progress(reporter.job_id()).await.unwrap().map(|s| s.status),
            Some(JobStatus::Failed)
        );
    }
}
