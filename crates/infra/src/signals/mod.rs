//! Ephemeral signal store: TTL'd key/value pairs shared by the API and workers.
//!
//! Absence is a normal answer. A missing or expired key reads as `None`,
//! never as an error.

pub mod in_memory;
pub mod job_signals;
#[cfg(feature = "redis")]
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use in_memory::InMemorySignalStore;
pub use job_signals::{JobSignals, SignalTtls};
#[cfg(feature = "redis")]
pub use self::redis::RedisSignalStore;

#[derive(Debug, Error)]
pub enum SignalStoreError {
    #[error("signal store backend error: {0}")]
    Backend(String),
    #[error("signal value is malformed: {0}")]
    Malformed(String),
}

impl SignalStoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SignalStoreError::Backend(_))
    }
}

#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Write `value`, replacing any previous value and resetting the TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SignalStoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, SignalStoreError>;

    /// Read and delete in one step (single-use values).
    async fn take(&self, key: &str) -> Result<Option<String>, SignalStoreError>;

    async fn delete(&self, key: &str) -> Result<(), SignalStoreError>;
}
