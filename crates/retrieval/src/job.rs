//! The persisted job record and the updates that mutate it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use docket_core::{JobId, UserId};

use crate::request::{RetrievalMode, RetrievalParams};
use crate::status::JobStatus;

/// A file produced by the worker for one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_number: Option<String>,
    pub storage_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub retrieved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_number: Option<String>,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorDescriptor {
    pub fn new(message: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            process_number: None,
            message: message.into(),
            occurred_at,
        }
    }

    pub fn for_process(
        process_number: impl Into<String>,
        message: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            process_number: Some(process_number.into()),
            message: message.into(),
            occurred_at,
        }
    }
}

/// One retrieval job. Never carries credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub user_id: UserId,
    pub requested_by: String,
    #[serde(flatten)]
    pub params: RetrievalParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub status: JobStatus,
    pub progress: u8,
    pub total_processes: Option<u32>,
    pub success_count: u32,
    pub failure_count: u32,
    pub files: Vec<FileDescriptor>,
    pub errors: Vec<ErrorDescriptor>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A single mutation of a job record.
///
/// Everything except `Cancel` is issued by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobUpdate {
    Advance {
        status: JobStatus,
        progress: Option<u8>,
    },
    Progress(u8),
    TotalProcesses(u32),
    ProcessSucceeded { files: Vec<FileDescriptor> },
    ProcessFailed(ErrorDescriptor),
    /// Job-level error that is not tied to a process count.
    ErrorRecorded(ErrorDescriptor),
    Cancel,
}

/// Why an update left the job untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateRejected {
    #[error("job is already {0}")]
    Terminal(JobStatus),

    #[error("transition {from} -> {to} is not allowed")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("{recorded} processes recorded exceeds total of {total}")]
    CountsExceedTotal { total: u32, recorded: u32 },

    #[error("progress {0} is outside 0..=100")]
    ProgressOutOfRange(u8),

    #[error("a job in status {0} cannot be cancelled")]
    NotCancellable(JobStatus),
}

impl Job {
    pub fn new(
        id: JobId,
        user_id: UserId,
        requested_by: impl Into<String>,
        params: RetrievalParams,
        profile: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            requested_by: requested_by.into(),
            params,
            profile,
            status: JobStatus::Pending,
            progress: 0,
            total_processes: None,
            success_count: 0,
            failure_count: 0,
            files: Vec::new(),
            errors: Vec::new(),
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn mode(&self) -> RetrievalMode {
        self.params.mode()
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Apply `update`, or reject it and leave `self` unchanged.
    pub fn apply(&mut self, update: JobUpdate, now: DateTime<Utc>) -> Result<(), UpdateRejected> {
        if self.status.is_terminal() {
            return Err(UpdateRejected::Terminal(self.status));
        }

        match update {
            JobUpdate::Advance { status, progress } => {
                if !self.status.can_advance_to(status) {
                    return Err(UpdateRejected::InvalidTransition {
                        from: self.status,
                        to: status,
                    });
                }
                if let Some(p) = progress {
                    check_progress(p)?;
                    self.progress = p;
                }
                self.enter(status, now);
            }
            JobUpdate::Progress(p) => {
                check_progress(p)?;
                self.progress = p;
            }
            JobUpdate::TotalProcesses(total) => {
                let recorded = self.recorded();
                if recorded > total {
                    return Err(UpdateRejected::CountsExceedTotal { total, recorded });
                }
                self.total_processes = Some(total);
            }
            JobUpdate::ProcessSucceeded { files } => {
                self.check_room_for_one_more()?;
                self.success_count += 1;
                self.files.extend(files);
            }
            JobUpdate::ProcessFailed(error) => {
                self.check_room_for_one_more()?;
                self.failure_count += 1;
                self.errors.push(error);
            }
            JobUpdate::ErrorRecorded(error) => self.errors.push(error),
            JobUpdate::Cancel => {
                if !self.status.is_cancellable() {
                    return Err(UpdateRejected::NotCancellable(self.status));
                }
                self.enter(JobStatus::Cancelled, now);
            }
        }
        Ok(())
    }

    fn enter(&mut self, status: JobStatus, now: DateTime<Utc>) {
        if status != JobStatus::Pending && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if status.is_terminal() {
            self.completed_at = Some(now);
        }
        if status == JobStatus::Completed {
            self.progress = 100;
        }
        self.status = status;
    }

    fn recorded(&self) -> u32 {
        self.success_count + self.failure_count
    }

    fn check_room_for_one_more(&self) -> Result<(), UpdateRejected> {
        match self.total_processes {
            Some(total) if self.recorded() >= total => Err(UpdateRejected::CountsExceedTotal {
                total,
                recorded: self.recorded() + 1,
            }),
            _ => Ok(()),
        }
    }
}

fn check_progress(progress: u8) -> Result<(), UpdateRejected> {
    if progress > 100 {
        return Err(UpdateRejected::ProgressOutOfRange(progress));
    }
    Ok(())
}
