//! Job lifecycle state machine.
//!
//! ```text
//! pending → authenticating → awaiting_2fa → selecting_profile → processing
//!         → downloading → checking_integrity → retrying → completed | failed
//!
//! loop-backs: downloading | checking_integrity | retrying → processing | downloading
//!             awaiting_2fa → authenticating
//! any non-terminal → failed (worker) | cancelled (orchestrator only)
//! ```

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use docket_core::DomainError;

/// Lifecycle status of a retrieval job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Authenticating,
    #[serde(rename = "awaiting_2fa")]
    AwaitingTwoFactor,
    SelectingProfile,
    Processing,
    Downloading,
    CheckingIntegrity,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 11] = [
        JobStatus::Pending,
        JobStatus::Authenticating,
        JobStatus::AwaitingTwoFactor,
        JobStatus::SelectingProfile,
        JobStatus::Processing,
        JobStatus::Downloading,
        JobStatus::CheckingIntegrity,
        JobStatus::Retrying,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub const TERMINAL: [JobStatus; 3] =
        [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled];

    pub const fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Authenticating => "authenticating",
            JobStatus::AwaitingTwoFactor => "awaiting_2fa",
            JobStatus::SelectingProfile => "selecting_profile",
            JobStatus::Processing => "processing",
            JobStatus::Downloading => "downloading",
            JobStatus::CheckingIntegrity => "checking_integrity",
            JobStatus::Retrying => "retrying",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// No further writes are accepted once a job is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Counted against the per-user admission limit.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// States in which a cancel request is honoured.
    ///
    /// `checking_integrity` and `retrying` are excluded: the job is too close
    /// to completion to interrupt.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            JobStatus::Pending
                | JobStatus::Authenticating
                | JobStatus::AwaitingTwoFactor
                | JobStatus::SelectingProfile
                | JobStatus::Processing
                | JobStatus::Downloading
        )
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Authenticating => 1,
            JobStatus::AwaitingTwoFactor => 2,
            JobStatus::SelectingProfile => 3,
            JobStatus::Processing => 4,
            JobStatus::Downloading => 5,
            JobStatus::CheckingIntegrity => 6,
            JobStatus::Retrying => 7,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => 8,
        }
    }

    /// Whether a worker may move a job from `self` to `next`.
    ///
    /// `cancelled` is never reachable this way; only the orchestrator cancels.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        if self.is_terminal() || next == JobStatus::Cancelled {
            return false;
        }
        if next == self || next == JobStatus::Failed {
            return true;
        }

        match (self, next) {
            (
                JobStatus::Downloading | JobStatus::CheckingIntegrity | JobStatus::Retrying,
                JobStatus::Processing | JobStatus::Downloading,
            ) => true,
            (JobStatus::AwaitingTwoFactor, JobStatus::Authenticating) => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown job status: {s}")))
    }
}
