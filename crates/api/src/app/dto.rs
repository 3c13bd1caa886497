use serde::{Deserialize, Serialize};

use docket_retrieval::{CreateJobRequest, Credentials, Job};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobBody {
    pub mode: Option<String>,
    pub credentials: Option<CredentialsBody>,
    #[serde(default)]
    pub process_numbers: Vec<String>,
    pub task_name: Option<String>,
    pub tag_id: Option<String>,
    pub tag_name: Option<String>,
    pub profile: Option<String>,
}

/// Missing fields are kept as empty strings so validation reports
/// `MISSING_CREDENTIALS` instead of a body parse error.
#[derive(Default, Deserialize)]
pub struct CredentialsBody {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for CredentialsBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsBody")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

impl From<CreateJobBody> for CreateJobRequest {
    fn from(body: CreateJobBody) -> Self {
        CreateJobRequest {
            mode: body.mode,
            credentials: body
                .credentials
                .map(|c| Credentials::new(c.username, c.password)),
            process_numbers: body.process_numbers,
            task_name: body.task_name,
            tag_id: body.tag_id,
            tag_name: body.tag_name,
            profile: body.profile,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TwoFactorBody {
    #[serde(default)]
    pub code: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
