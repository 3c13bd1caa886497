//! `docket-core`: identifiers and error primitives shared by every crate.
//!
//! Pure types only: no IO, no async, no transport concerns.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{JobId, UserId};
