use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use docket_infra::OrchestrationError;
use docket_retrieval::JobError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn job_error_status(err: &JobError) -> StatusCode {
    match err {
        JobError::NotFound => StatusCode::NOT_FOUND,
        JobError::LimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        JobError::MissingCredentials
        | JobError::MissingParams(_)
        | JobError::InvalidProcessNumber(_)
        | JobError::InvalidCode => StatusCode::BAD_REQUEST,
        JobError::InvalidState { .. } => StatusCode::CONFLICT,
    }
}

/// Domain errors go out verbatim; infrastructure faults are logged and
/// reported as a generic 500.
pub fn orchestration_error_to_response(err: OrchestrationError) -> axum::response::Response {
    match err {
        OrchestrationError::Job(e) => json_error(job_error_status(&e), e.code(), e.to_string()),
        other => {
            tracing::error!(error = %other, "job operation failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal error",
            )
        }
    }
}

/// Body or query string the extractors could not decode. Keeps their status
/// (400, 415 or 422) but answers in the same JSON shape as every other error.
pub fn invalid_request(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    json_error(status, "INVALID_REQUEST", message)
}

pub fn not_found() -> axum::response::Response {
    let err = JobError::NotFound;
    json_error(StatusCode::NOT_FOUND, err.code(), err.to_string())
}

#[cfg(test)]
mod tests {
    use docket_infra::job_store::JobStoreError;
    use docket_retrieval::JobStatus;

    use super::*;

    #[test]
    fn maps_every_domain_code() {
        let cases = [
            (JobError::NotFound, StatusCode::NOT_FOUND),
            (JobError::LimitExceeded { active: 3, max: 3 }, StatusCode::TOO_MANY_REQUESTS),
            (JobError::MissingCredentials, StatusCode::BAD_REQUEST),
            (JobError::missing_params("taskName"), StatusCode::BAD_REQUEST),
            (JobError::InvalidProcessNumber("bad".into()), StatusCode::BAD_REQUEST),
            (JobError::InvalidCode, StatusCode::BAD_REQUEST),
            (
                JobError::invalid_state("cancel", JobStatus::Completed),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(job_error_status(&err), status, "{err:?}");
        }
    }

    #[test]
    fn undecodable_input_keeps_extractor_status() {
        let res = invalid_request(StatusCode::UNPROCESSABLE_ENTITY, "missing field `code`");
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn infrastructure_faults_become_internal_errors() {
        let res = orchestration_error_to_response(OrchestrationError::Store(
            JobStoreError::Storage("connection reset".into()),
        ));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
