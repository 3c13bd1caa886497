//! Typed, job-scoped view over a [`SignalStore`].
//!
//! Three independent channels per job, each with its own TTL:
//!
//! | key | writer | reader | TTL |
//! |---|---|---|---|
//! | `job:{id}:progress` | worker (and cancel) | API | refreshed on every write |
//! | `job:{id}:2fa` | API | worker, consumed on read | short |
//! | `job:{id}:cancel` | API | worker, between units of work | outlasts a unit of work |

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use docket_core::JobId;
use docket_retrieval::{ProgressSnapshot, TwoFactorCode};

use super::{SignalStore, SignalStoreError};

const CANCELLED_MARKER: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalTtls {
    pub progress: Duration,
    pub two_factor: Duration,
    pub cancellation: Duration,
}

impl Default for SignalTtls {
    fn default() -> Self {
        Self {
            progress: Duration::from_secs(2 * 60 * 60),
            two_factor: Duration::from_secs(5 * 60),
            cancellation: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Clone)]
pub struct JobSignals {
    store: Arc<dyn SignalStore>,
    ttls: SignalTtls,
}

impl std::fmt::Debug for JobSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSignals").field("ttls", &self.ttls).finish_non_exhaustive()
    }
}

fn progress_key(job_id: JobId) -> String {
    format!("job:{job_id}:progress")
}

fn two_factor_key(job_id: JobId) -> String {
    format!("job:{job_id}:2fa")
}

fn cancel_key(job_id: JobId) -> String {
    format!("job:{job_id}:cancel")
}

impl JobSignals {
    pub fn new(store: Arc<dyn SignalStore>, ttls: SignalTtls) -> Self {
        Self { store, ttls }
    }

    pub async fn publish_progress(
        &self,
        job_id: JobId,
        snapshot: ProgressSnapshot,
    ) -> Result<(), SignalStoreError> {
        let value = serde_json::to_string(&snapshot)
            .map_err(|e| SignalStoreError::Malformed(e.to_string()))?;
        self.store
            .set(&progress_key(job_id), &value, self.ttls.progress)
            .await
    }

    /// Latest snapshot, or `None` before the worker has published one.
    pub async fn progress(&self, job_id: JobId) -> Result<Option<ProgressSnapshot>, SignalStoreError> {
        let Some(raw) = self.store.get(&progress_key(job_id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| SignalStoreError::Malformed(format!("progress for job {job_id}: {e}")))
    }

    pub async fn submit_two_factor(
        &self,
        job_id: JobId,
        code: &TwoFactorCode,
    ) -> Result<(), SignalStoreError> {
        self.store
            .set(&two_factor_key(job_id), code.as_str(), self.ttls.two_factor)
            .await
    }

    /// Consume a pending code. A second call returns `None`.
    pub async fn take_two_factor(&self, job_id: JobId) -> Result<Option<TwoFactorCode>, SignalStoreError> {
        let Some(raw) = self.store.take(&two_factor_key(job_id)).await? else {
            return Ok(None);
        };
        match TwoFactorCode::parse(&raw) {
            Ok(code) => Ok(Some(code)),
            Err(_) => {
                warn!(job_id = %job_id, "discarding malformed two-factor code");
                Ok(None)
            }
        }
    }

    pub async fn request_cancellation(&self, job_id: JobId) -> Result<(), SignalStoreError> {
        self.store
            .set(&cancel_key(job_id), CANCELLED_MARKER, self.ttls.cancellation)
            .await
    }

    /// Withdraw a flag raised for a cancel that did not go through.
    pub async fn clear_cancellation(&self, job_id: JobId) -> Result<(), SignalStoreError> {
        self.store.delete(&cancel_key(job_id)).await
    }

    pub async fn is_cancelled(&self, job_id: JobId) -> Result<bool, SignalStoreError> {
        Ok(self.store.get(&cancel_key(job_id)).await?.is_some())
    }
}
