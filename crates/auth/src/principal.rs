use docket_core::UserId;

use crate::{Permission, Role};

/// A fully resolved caller, ready for authorization decisions.
///
/// Built by the transport layer from verified claims plus a role policy; the
/// orchestration core only ever sees the `user_id` and `display_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
