//! Postgres-backed job store.
//!
//! ## Admission
//!
//! `insert_admitted` takes a transaction-scoped advisory lock keyed by the
//! owner's id before counting active jobs, so two concurrent submissions from
//! the same user serialise while different users never contend.
//!
//! ## Updates
//!
//! `apply` loads the row `FOR UPDATE`, runs [`Job::apply`] in process and
//! writes the result back in the same transaction. A rejected update rolls
//! back and is reported as [`UpdateOutcome::Rejected`].
//!
//! ## Error mapping
//!
//! | SQLx error | Code | JobStoreError |
//! |---|---|---|
//! | Database (unique violation on insert) | `23505` | `AlreadyExists` |
//! | Database (foreign key violation on audit) | `23503` | `NotFound` |
//! | Row decode / column decode | n/a | `Corrupt` |
//! | anything else | n/a | `Storage` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use docket_core::{JobId, UserId};
use docket_retrieval::{
    AuditRecord, ErrorDescriptor, FileDescriptor, Job, JobStatus, JobUpdate, RetrievalParams,
};

use super::{Admission, JobPage, JobStore, JobStoreError, Page, UpdateOutcome};
use crate::retry::{RetryPolicy, retry};

const SCHEMA: &str = include_str!("schema.sql");

const JOB_COLUMNS: &str = "id, user_id, requested_by, params, profile, status, progress, \
     total_processes, success_count, failure_count, files, errors, created_at, started_at, \
     completed_at";

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

const ACTIVE_FILTER: &str = "status NOT IN ('completed', 'failed', 'cancelled')";

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
    retry: RetryPolicy,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), JobStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn fetch_job(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM retrieval_jobs WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(*job_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_job", e))?;

        row.map(|r| decode_job(&r)).transpose()
    }

    async fn fetch_page(&self, user_id: UserId, page: Page) -> Result<JobPage, JobStoreError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM retrieval_jobs WHERE user_id = $1")
            .bind(*user_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_jobs", e))?;

        let query = format!(
            "SELECT {JOB_COLUMNS} FROM retrieval_jobs WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&query)
            .bind(*user_id.as_uuid())
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_jobs", e))?;

        let jobs = rows.iter().map(decode_job).collect::<Result<Vec<_>, _>>()?;
        Ok(JobPage {
            jobs,
            total: total.max(0) as u64,
        })
    }

    async fn fetch_active_count(&self, user_id: UserId) -> Result<u32, JobStoreError> {
        let query = format!("SELECT COUNT(*) FROM retrieval_jobs WHERE user_id = $1 AND {ACTIVE_FILTER}");
        let count: i64 = sqlx::query_scalar(&query)
            .bind(*user_id.as_uuid())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_active", e))?;
        Ok(count.max(0) as u32)
    }

    async fn fetch_audit(&self, job_id: JobId) -> Result<Vec<AuditRecord>, JobStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, process_number, file_name, retrieved_at
            FROM retrieval_audit
            WHERE job_id = $1
            ORDER BY retrieved_at ASC, id ASC
            "#,
        )
        .bind(*job_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_audit", e))?;

        rows.iter()
            .map(|row| {
                Ok(AuditRecord {
                    job_id: JobId::from_uuid(row.try_get("job_id").map_err(corrupt)?),
                    process_number: row.try_get("process_number").map_err(corrupt)?,
                    file_name: row.try_get("file_name").map_err(corrupt)?,
                    retrieved_at: row.try_get("retrieved_at").map_err(corrupt)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(
        skip(self, job),
        fields(job_id = %job.id, user_id = %job.user_id),
        err
    )]
    async fn insert_admitted(&self, job: Job, max_active: u32) -> Result<Admission, JobStoreError> {
        let counters = Counters::of(&job)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(job.user_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("admission_lock", e))?;

        let query = format!("SELECT COUNT(*) FROM retrieval_jobs WHERE user_id = $1 AND {ACTIVE_FILTER}");
        let active: i64 = sqlx::query_scalar(&query)
            .bind(*job.user_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("count_active", e))?;
        let active = active.max(0) as u32;

        if active >= max_active {
            // Dropping the transaction rolls it back and releases the lock.
            return Ok(Admission::Rejected { active });
        }

        sqlx::query(
            r#"
            INSERT INTO retrieval_jobs (
                id, user_id, requested_by, mode, params, profile, status, progress,
                total_processes, success_count, failure_count, files, errors,
                created_at, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(*job.id.as_uuid())
        .bind(*job.user_id.as_uuid())
        .bind(&job.requested_by)
        .bind(job.mode().as_str())
        .bind(Json(&job.params))
        .bind(&job.profile)
        .bind(job.status.as_str())
        .bind(i16::from(job.progress))
        .bind(counters.total_processes)
        .bind(counters.success_count)
        .bind(counters.failure_count)
        .bind(Json(&job.files))
        .bind(Json(&job.errors))
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if has_code(&e, UNIQUE_VIOLATION) {
                JobStoreError::AlreadyExists(job.id)
            } else {
                map_sqlx_error("insert_job", e)
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Admission::Admitted(job))
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        retry(&self.retry, "get_job", JobStoreError::is_transient, move || {
            self.fetch_job(job_id)
        })
        .await
    }

    #[instrument(skip(self), fields(user_id = %user_id, limit = page.limit, offset = page.offset), err)]
    async fn list_by_user(&self, user_id: UserId, page: Page) -> Result<JobPage, JobStoreError> {
        retry(&self.retry, "list_jobs", JobStoreError::is_transient, move || {
            self.fetch_page(user_id, page)
        })
        .await
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn count_active_by_user(&self, user_id: UserId) -> Result<u32, JobStoreError> {
        retry(&self.retry, "count_active", JobStoreError::is_transient, move || {
            self.fetch_active_count(user_id)
        })
        .await
    }

    #[instrument(skip(self, update), fields(job_id = %job_id), err)]
    async fn apply(
        &self,
        job_id: JobId,
        update: JobUpdate,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, JobStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let query = format!("SELECT {JOB_COLUMNS} FROM retrieval_jobs WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&query)
            .bind(*job_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_job", e))?
            .ok_or(JobStoreError::NotFound(job_id))?;

        let current = decode_job(&row)?;
        let mut next = current.clone();
        if let Err(reason) = next.apply(update, now) {
            return Ok(UpdateOutcome::Rejected {
                job: current,
                reason,
            });
        }
        let counters = Counters::of(&next)?;

        sqlx::query(
            r#"
            UPDATE retrieval_jobs SET
                status = $2,
                progress = $3,
                total_processes = $4,
                success_count = $5,
                failure_count = $6,
                files = $7,
                errors = $8,
                started_at = $9,
                completed_at = $10
            WHERE id = $1
            "#,
        )
        .bind(*job_id.as_uuid())
        .bind(next.status.as_str())
        .bind(i16::from(next.progress))
        .bind(counters.total_processes)
        .bind(counters.success_count)
        .bind(counters.failure_count)
        .bind(Json(&next.files))
        .bind(Json(&next.errors))
        .bind(next.started_at)
        .bind(next.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_job", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(UpdateOutcome::Applied(next))
    }

    #[instrument(skip(self, record), fields(job_id = %record.job_id), err)]
    async fn record_audit(&self, record: AuditRecord) -> Result<(), JobStoreError> {
        sqlx::query(
            r#"
            INSERT INTO retrieval_audit (job_id, process_number, file_name, retrieved_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(*record.job_id.as_uuid())
        .bind(&record.process_number)
        .bind(&record.file_name)
        .bind(record.retrieved_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if has_code(&e, FOREIGN_KEY_VIOLATION) {
                JobStoreError::NotFound(record.job_id)
            } else {
                map_sqlx_error("record_audit", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn list_audit(&self, job_id: JobId) -> Result<Vec<AuditRecord>, JobStoreError> {
        retry(&self.retry, "list_audit", JobStoreError::is_transient, move || {
            self.fetch_audit(job_id)
        })
        .await
    }
}

/// Raw `retrieval_jobs` row.
struct JobRow {
    id: Uuid,
    user_id: Uuid,
    requested_by: String,
    params: Json<RetrievalParams>,
    profile: Option<String>,
    status: String,
    progress: i16,
    total_processes: Option<i32>,
    success_count: i32,
    failure_count: i32,
    files: Json<Vec<FileDescriptor>>,
    errors: Json<Vec<ErrorDescriptor>>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for JobRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            requested_by: row.try_get("requested_by")?,
            params: row.try_get("params")?,
            profile: row.try_get("profile")?,
            status: row.try_get("status")?,
            progress: row.try_get("progress")?,
            total_processes: row.try_get("total_processes")?,
            success_count: row.try_get("success_count")?,
            failure_count: row.try_get("failure_count")?,
            files: row.try_get("files")?,
            errors: row.try_get("errors")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

impl TryFrom<JobRow> for Job {
    type Error = JobStoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|e| JobStoreError::Corrupt(format!("job {}: {e}", row.id)))?;

        Ok(Job {
            id: JobId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            requested_by: row.requested_by,
            params: row.params.0,
            profile: row.profile,
            status,
            progress: row.progress.clamp(0, 100) as u8,
            total_processes: row.total_processes.map(|t| t.max(0) as u32),
            success_count: row.success_count.max(0) as u32,
            failure_count: row.failure_count.max(0) as u32,
            files: row.files.0,
            errors: row.errors.0,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

/// Job counters as stored in `INTEGER` columns.
#[derive(Debug, PartialEq, Eq)]
struct Counters {
    total_processes: Option<i32>,
    success_count: i32,
    failure_count: i32,
}

impl Counters {
    fn of(job: &Job) -> Result<Self, JobStoreError> {
        Ok(Self {
            total_processes: job
                .total_processes
                .map(|t| to_db_count("total_processes", t))
                .transpose()?,
            success_count: to_db_count("success_count", job.success_count)?,
            failure_count: to_db_count("failure_count", job.failure_count)?,
        })
    }
}

fn to_db_count(column: &str, value: u32) -> Result<i32, JobStoreError> {
    i32::try_from(value)
        .map_err(|_| JobStoreError::Storage(format!("{column} value {value} exceeds column range")))
}

fn decode_job(row: &PgRow) -> Result<Job, JobStoreError> {
    JobRow::from_row(row).map_err(corrupt)?.try_into()
}

fn corrupt(err: sqlx::Error) -> JobStoreError {
    JobStoreError::Corrupt(format!("failed to decode row: {err}"))
}

/// Whether `err` is a database error with the given SQLSTATE.
fn has_code(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(code),
        _ => false,
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> JobStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            JobStoreError::Storage(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            JobStoreError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        sqlx::Error::PoolClosed => {
            JobStoreError::Storage(format!("connection pool closed in {operation}"))
        }
        _ => JobStoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}
