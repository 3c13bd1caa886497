use docket_auth::Role;
use docket_core::UserId;

/// Authenticated caller of a request (verified identity + roles).
///
/// Inserted by the auth middleware; handlers never look at raw headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    display_name: String,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, display_name: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            roles,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
