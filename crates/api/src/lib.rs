//! HTTP API: configuration, authentication, routing and error mapping for
//! the retrieval job endpoints.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
