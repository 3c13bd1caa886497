//! Job submission input and its validation.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::process_number::ProcessNumber;

/// How the worker selects the processes to retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// An explicit list of process identifiers.
    ByNumber,
    /// Every process of a named task in the document source.
    ByTask,
    /// Every process carrying a tag.
    ByTag,
}

impl RetrievalMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            RetrievalMode::ByNumber => "by_number",
            RetrievalMode::ByTask => "by_task",
            RetrievalMode::ByTag => "by_tag",
        }
    }
}

impl core::fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMode {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "by_number" => Ok(RetrievalMode::ByNumber),
            "by_task" => Ok(RetrievalMode::ByTask),
            "by_tag" => Ok(RetrievalMode::ByTag),
            _ => Err(JobError::missing_params(
                "mode must be one of: by_number, by_task, by_tag",
            )),
        }
    }
}

/// Resolved, mode-specific parameters forwarded to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RetrievalParams {
    ByNumber { process_numbers: Vec<ProcessNumber> },
    ByTask { task_name: String },
    ByTag {
        tag_id: Option<String>,
        tag_name: Option<String>,
    },
}

impl RetrievalParams {
    pub fn mode(&self) -> RetrievalMode {
        match self {
            RetrievalParams::ByNumber { .. } => RetrievalMode::ByNumber,
            RetrievalParams::ByTask { .. } => RetrievalMode::ByTask,
            RetrievalParams::ByTag { .. } => RetrievalMode::ByTag,
        }
    }
}

/// Login secret for the document source.
///
/// Travels only inside the queued work item; never persisted with the job and
/// never printed (`Debug` is redacted).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Unvalidated submission, as received from a caller.
#[derive(Debug, Clone, Default)]
pub struct CreateJobRequest {
    pub mode: Option<String>,
    pub credentials: Option<Credentials>,
    pub process_numbers: Vec<String>,
    pub task_name: Option<String>,
    pub tag_id: Option<String>,
    pub tag_name: Option<String>,
    pub profile: Option<String>,
}

/// Submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub credentials: Credentials,
    pub params: RetrievalParams,
    pub profile: Option<String>,
}

impl CreateJobRequest {
    /// Validate in a fixed order: credentials, mode, mode parameters.
    ///
    /// The first failure wins; nothing is written by validation.
    pub fn validate(self) -> Result<ValidatedRequest, JobError> {
        let credentials = self
            .credentials
            .filter(Credentials::is_complete)
            .ok_or(JobError::MissingCredentials)?;

        let mode = self
            .mode
            .as_deref()
            .ok_or_else(|| JobError::missing_params("mode is required"))?
            .parse::<RetrievalMode>()?;

        let params = match mode {
            RetrievalMode::ByNumber => {
                let process_numbers = parse_process_numbers(&self.process_numbers)?;
                RetrievalParams::ByNumber { process_numbers }
            }
            RetrievalMode::ByTask => {
                let task_name = non_blank(self.task_name)
                    .ok_or_else(|| JobError::missing_params("taskName is required for by_task"))?;
                RetrievalParams::ByTask { task_name }
            }
            RetrievalMode::ByTag => {
                let tag_id = non_blank(self.tag_id);
                let tag_name = non_blank(self.tag_name);
                if tag_id.is_none() && tag_name.is_none() {
                    return Err(JobError::missing_params(
                        "tagId or tagName is required for by_tag",
                    ));
                }
                RetrievalParams::ByTag { tag_id, tag_name }
            }
        };

        Ok(ValidatedRequest {
            credentials,
            params,
            profile: non_blank(self.profile),
        })
    }
}

fn parse_process_numbers(raw: &[String]) -> Result<Vec<ProcessNumber>, JobError> {
    if raw.iter().all(|n| n.trim().is_empty()) {
        return Err(JobError::missing_params(
            "at least one process number is required for by_number",
        ));
    }

    let mut numbers: Vec<ProcessNumber> = Vec::with_capacity(raw.len());
    for value in raw.iter().filter(|n| !n.trim().is_empty()) {
        let number = ProcessNumber::parse(value)?;
        if !numbers.contains(&number) {
            numbers.push(number);
        }
    }
    Ok(numbers)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
