//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, signal and queue wiring behind the orchestrator
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::authz::{self, RolePolicy};
use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = services::build_services(&config.infra).await?;
    Ok(build_app_with_services(config, Arc::new(services)))
}

/// Build the router around already-wired services.
pub fn build_app_with_services(config: &ApiConfig, services: Arc<services::AppServices>) -> Router {
    let jwt = Arc::new(docket_auth::Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };
    let policy = RolePolicy::new(config.authorized_role.clone());

    let jobs = routes::jobs::router().layer(axum::middleware::from_fn_with_state(
        policy,
        authz::require_jobs_manage,
    ));

    // Protected routes: require a verified bearer token.
    let protected = routes::router(jobs)
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
