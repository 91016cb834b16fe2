//! Role types for platform access.
//!
//! The role is a free-form string stored in account metadata and in the
//! profile row. The two tiers the application knows about get their own
//! variants; anything else is carried through untouched so it can still be
//! compared and reported.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability tier of an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// Files and tracks complaints.
    #[default]
    Citizen,
    /// Reviews complaints and changes their status.
    Admin,
    /// A role string this application does not recognise.
    Other(String),
}

impl Role {
    /// Returns the role as stored by the provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Citizen => "citizen",
            Self::Admin => "admin",
            Self::Other(role) => role,
        }
    }

    /// Returns true if this role has admin privileges.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            "citizen" => Self::Citizen,
            "admin" => Self::Admin,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "citizen" => Self::Citizen,
            "admin" => Self::Admin,
            _ => Self::Other(s),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(role) => role,
            known => known.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_is_admin() {
        assert!(!Role::Citizen.is_admin());
        assert!(Role::Admin.is_admin());
        assert!(!Role::from("officer").is_admin());
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert_eq!(Role::from("admin"), Role::Admin);
        assert_eq!(Role::from("Admin"), Role::Other("Admin".to_string()));
    }

    #[test]
    fn default_is_citizen() {
        assert_eq!(Role::default(), Role::Citizen);
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&Role::Admin).expect("serialize");
        assert_eq!(json, "\"admin\"");

        let parsed: Role = serde_json::from_str("\"department_head\"").expect("deserialize");
        assert_eq!(parsed, Role::Other("department_head".to_string()));
        assert_eq!(parsed.to_string(), "department_head");
    }
}
