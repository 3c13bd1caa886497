use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use docket_core::JobId;
use docket_infra::job_store::Page;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_job).get(list_jobs))
        .route("/:job_id", get(get_job).delete(cancel_job))
        .route("/:job_id/progress", get(get_progress))
        .route("/:job_id/2fa", post(submit_two_factor))
        .route("/:job_id/files", get(get_files))
        .route("/:job_id/audit", get(get_audit))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(value)| value)
        .map_err(|rejection| errors::invalid_request(rejection.status(), rejection.body_text()))
}

/// Malformed ids read as absent, like foreign ones.
fn parse_job_id(raw: &str) -> Result<JobId, axum::response::Response> {
    raw.parse().map_err(|_| errors::not_found())
}

pub async fn create_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<dto::CreateJobBody>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(body) {
        Ok(body) => body,
        Err(res) => return res,
    };
    match services
        .orchestrator
        .create_job(principal.user_id(), principal.display_name(), body.into())
        .await
    {
        Ok(job) => (StatusCode::CREATED, Json(job)).into_response(),
        Err(e) => errors::orchestration_error_to_response(e),
    }
}

pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<dto::ListQuery>, QueryRejection>,
) -> axum::response::Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            return errors::invalid_request(rejection.status(), rejection.body_text());
        }
    };
    let page = Page::new(query.limit, query.offset);
    match services.orchestrator.list_jobs(principal.user_id(), page).await {
        Ok(page) => Json(dto::JobListResponse {
            jobs: page.jobs,
            total: page.total,
        })
        .into_response(),
        Err(e) => errors::orchestration_error_to_response(e),
    }
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.orchestrator.get_job(job_id, principal.user_id()).await {
        Ok(job) => Json(job).into_response(),
        Err(e) => errors::orchestration_error_to_response(e),
    }
}

pub async fn get_progress(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services
        .orchestrator
        .get_progress(job_id, principal.user_id())
        .await
    {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => errors::orchestration_error_to_response(e),
    }
}

pub async fn submit_two_factor(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(job_id): Path<String>,
    body: Result<Json<dto::TwoFactorBody>, JsonRejection>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(res) => return res,
    };
    let body = match json_body(body) {
        Ok(body) => body,
        Err(res) => return res,
    };

    match services
        .orchestrator
        .submit_two_factor(job_id, principal.user_id(), &body.code)
        .await
    {
        Ok(()) => Json(dto::MessageResponse {
            message: "two-factor code submitted",
        })
        .into_response(),
        Err(e) => errors::orchestration_error_to_response(e),
    }
}

pub async fn cancel_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.orchestrator.cancel_job(job_id, principal.user_id()).await {
        Ok(job) => Json(job).into_response(),
        Err(e) => errors::orchestration_error_to_response(e),
    }
}

pub async fn get_files(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.orchestrator.get_files(job_id, principal.user_id()).await {
        Ok(files) => Json(files).into_response(),
        Err(e) => errors::orchestration_error_to_response(e),
    }
}

pub async fn get_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let job_id = match parse_job_id(&job_id) {
        Ok(id) => id,
        Err(res) => return res,
    };

    match services.orchestrator.get_audit(job_id, principal.user_id()).await {
        Ok(records) => Json(records).into_response(),
        Err(e) => errors::orchestration_error_to_response(e),
    }
}
