//! Authentication and authorization module
//!
//! Provides JWT-based authentication and role-based access control.

mod jwt;
mod middleware;
mod password;

pub use jwt::{create_token, decode_token, AccessToken, Claims};
pub use middleware::{auth_middleware, require_role};
pub use password::{hash_password, verify_password};

use serde::{Deserialize, Serialize};

/// User roles for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access to the catalog
    Viewer,
    /// Owns services: create/update services, BIA and status
    BusinessOwner,
    /// Records and maintains risk scores
    OpsAnalyst,
    /// Manages integrations and dependency views
    Engineer,
}

impl Role {
    pub fn can_manage_services(&self) -> bool {
        matches!(self, Role::BusinessOwner)
    }

    pub fn can_record_risk(&self) -> bool {
        matches!(self, Role::OpsAnalyst)
    }

    pub fn can_manage_integrations(&self) -> bool {
        matches!(self, Role::Engineer)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::BusinessOwner => "business_owner",
            Role::OpsAnalyst => "ops_analyst",
            Role::Engineer => "engineer",
        }
    }

    /// Parse a stored role string, defaulting unknown values to `Viewer`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "business_owner" => Role::BusinessOwner,
            "ops_analyst" => Role::OpsAnalyst,
            "engineer" => Role::Engineer,
            _ => Role::Viewer,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Viewer
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_permissions() {
        assert!(Role::BusinessOwner.can_manage_services());
        assert!(!Role::OpsAnalyst.can_manage_services());
        assert!(Role::OpsAnalyst.can_record_risk());
        assert!(Role::Engineer.can_manage_integrations());
        assert!(!Role::Viewer.can_manage_services());
        assert!(!Role::Viewer.can_record_risk());
        assert!(!Role::Viewer.can_manage_integrations());
    }

    #[test]
    fn role_storage_round_trip() {
        for role in [
            Role::Viewer,
            Role::BusinessOwner,
            Role::OpsAnalyst,
            Role::Engineer,
        ] {
            assert_eq!(Role::from_db(role.as_str()), role);
        }
        assert_eq!(Role::from_db("superuser"), Role::Viewer);
    }
}
