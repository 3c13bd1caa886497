//! Document-retrieval job domain.
//!
//! Business rules for retrieval jobs, implemented as deterministic domain
//! logic (no IO, no HTTP, no storage): the lifecycle state machine, request
//! validation, the job record and the messages exchanged with workers.

pub mod audit;
pub mod error;
pub mod job;
pub mod process_number;
pub mod progress;
pub mod request;
pub mod status;
pub mod two_factor;
pub mod work_item;

pub use audit::AuditRecord;
pub use error::JobError;
pub use job::{ErrorDescriptor, FileDescriptor, Job, JobUpdate, UpdateRejected};
pub use process_number::ProcessNumber;
pub use progress::ProgressSnapshot;
pub use request::{CreateJobRequest, Credentials, RetrievalMode, RetrievalParams, ValidatedRequest};
pub use status::JobStatus;
pub use two_factor::TwoFactorCode;
pub use work_item::WorkItem;
