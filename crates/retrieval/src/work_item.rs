use serde::{Deserialize, Serialize};

use docket_core::{JobId, UserId};

use crate::job::Job;
use crate::request::{Credentials, RetrievalParams};

/// Queue payload handed to the worker.
///
/// The only place credentials live. `job_id` doubles as the queue's
/// deduplication key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub job_id: JobId,
    pub user_id: UserId,
    pub requested_by: String,
    pub credentials: Credentials,
    #[serde(flatten)]
    pub params: RetrievalParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl WorkItem {
    pub fn for_job(job: &Job, credentials: Credentials) -> Self {
        Self {
            job_id: job.id,
            user_id: job.user_id,
            requested_by: job.requested_by.clone(),
            credentials,
            params: job.params.clone(),
            profile: job.profile.clone(),
        }
    }
}
