//! Role gate for the job endpoints.
//!
//! Authentication happens in [`crate::middleware`]; this maps the caller's
//! roles to permissions and rejects callers without the required one before
//! any handler runs.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use docket_auth::{AuthzError, Permission, Principal, Role, authorize, permissions::retrieval};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Role → permission mapping for this deployment.
#[derive(Debug, Clone)]
pub struct RolePolicy {
    authorized_role: Role,
}

impl RolePolicy {
    pub fn new(authorized_role: Role) -> Self {
        Self { authorized_role }
    }

    /// `admin` gets everything; the authorized role may manage its own jobs.
    pub fn permissions_for(&self, roles: &[Role]) -> Vec<Permission> {
        if roles.contains(&Role::ADMIN) {
            return vec![Permission::WILDCARD];
        }
        if roles.contains(&self.authorized_role) {
            return vec![retrieval::JOBS_MANAGE];
        }
        Vec::new()
    }

    pub fn principal(&self, ctx: &PrincipalContext) -> Principal {
        Principal {
            user_id: ctx.user_id(),
            display_name: ctx.display_name().to_string(),
            roles: ctx.roles().to_vec(),
            permissions: self.permissions_for(ctx.roles()),
        }
    }

    pub fn check(&self, ctx: &PrincipalContext, required: &Permission) -> Result<(), AuthzError> {
        authorize(&self.principal(ctx), required)
    }
}

/// Rejects callers that may not manage retrieval jobs with `403 FORBIDDEN`.
pub async fn require_jobs_manage(
    State(policy): State<RolePolicy>,
    req: Request,
    next: Next,
) -> Response {
    let Some(ctx) = req.extensions().get::<PrincipalContext>() else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "authentication required");
    };

    if let Err(e) = policy.check(ctx, &retrieval::JOBS_MANAGE) {
        tracing::info!(user_id = %ctx.user_id(), error = %e, "caller lacks job permission");
        return errors::json_error(StatusCode::FORBIDDEN, "FORBIDDEN", e.to_string());
    }

    next.run(req).await
}
