//! Infrastructure layer: stores, signals, queue, orchestration and the worker
//! contract.

pub mod config;
pub mod job_store;
pub mod orchestrator;
pub mod queue;
#[cfg(feature = "redis")]
pub mod redis_client;
pub mod retry;
pub mod signals;
pub mod worker;

pub use config::{ConfigError, InfraConfig, OrchestratorConfig, QueueConfig};
pub use orchestrator::{JobOrchestrator, OrchestrationError, OrchestrationResult};
