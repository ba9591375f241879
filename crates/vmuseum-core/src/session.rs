//! Session identity as supplied by the authentication layer.
//!
//! The marketplace trusts these values as already authenticated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::UserId;

/// A user's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Artist,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Artist => "Artist",
            Role::Customer => "Customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Artist" => Ok(Role::Artist),
            "Customer" => Ok(Role::Customer),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated identity attached to one request.
///
/// Either field may be absent when the session is incomplete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Option<UserId>,
    pub role: Option<Role>,
}

impl Session {
    /// A complete session.
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id: Some(user_id),
            role: Some(role),
        }
    }

    /// A session with no identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Whether the session carries the given role.
    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }
}
