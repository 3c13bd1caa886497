//! Caller-facing error taxonomy of the job operations.

use thiserror::Error;

use crate::status::JobStatus;

/// Typed domain failure with a stable code.
///
/// Every variant is caller-induced: resubmitting with corrected input fixes
/// it, except `LimitExceeded`, which clears once an active job finishes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Job absent, or owned by someone else (deliberately indistinguishable).
    #[error("job not found")]
    NotFound,

    #[error("active job limit reached ({active} of {max} allowed)")]
    LimitExceeded { active: u32, max: u32 },

    #[error("credentials are required (username and password)")]
    MissingCredentials,

    #[error("missing parameters: {0}")]
    MissingParams(String),

    #[error("invalid process number: {0}")]
    InvalidProcessNumber(String),

    #[error("cannot {operation} a job in status {status}")]
    InvalidState {
        operation: &'static str,
        status: JobStatus,
    },

    #[error("two-factor code must be exactly 6 digits")]
    InvalidCode,
}

impl JobError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            JobError::NotFound => "NOT_FOUND",
            JobError::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            JobError::MissingCredentials => "MISSING_CREDENTIALS",
            JobError::MissingParams(_) => "MISSING_PARAMS",
            JobError::InvalidProcessNumber(_) => "INVALID_PROCESS_NUMBER",
            JobError::InvalidState { .. } => "INVALID_STATE",
            JobError::InvalidCode => "INVALID_CODE",
        }
    }

    pub fn missing_params(msg: impl Into<String>) -> Self {
        Self::MissingParams(msg.into())
    }

    pub fn invalid_state(operation: &'static str, status: JobStatus) -> Self {
        Self::InvalidState { operation, status }
    }
}
