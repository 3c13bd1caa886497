use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docket_core::JobId;

use crate::job::FileDescriptor;

/// One row per file successfully retrieved for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_number: Option<String>,
    pub file_name: String,
    pub retrieved_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn for_file(job_id: JobId, file: &FileDescriptor) -> Self {
        Self {
            job_id,
            process_number: file.process_number.clone(),
            file_name: file.name.clone(),
            retrieved_at: file.retrieved_at,
        }
    }
}
