use axum::{routing::get, Router};

pub mod jobs;
pub mod system;

/// Router for all authenticated endpoints.
///
/// `jobs` is the role-gated part; the caller wraps it with the gate before
/// nesting, see [`crate::app::build_app_with_services`].
pub fn router(jobs: Router) -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/retrieval/jobs", jobs)
}
