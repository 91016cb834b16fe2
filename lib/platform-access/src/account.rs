//! Identity-provider account records.
//!
//! An `Account` is owned by the identity provider. The application reads
//! it after sign-in and compares its declared role against the role the
//! caller asked to log in as.

use crate::role::Role;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use urbansetu_core::AccountId;

/// Free-form metadata attached to an account at sign-up.
///
/// Keys the application understands are lifted into fields; everything
/// else is preserved in `extra` so updates do not drop it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    /// Declared role (`"citizen"`, `"admin"`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Full display name entered at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Contact phone entered at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Department for staff accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Any other metadata keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserMetadata {
    /// Metadata carrying only a role.
    #[must_use]
    pub fn with_role(role: &Role) -> Self {
        Self {
            role: Some(role.to_string()),
            ..Self::default()
        }
    }
}

/// An identity-provider account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Provider-issued account identifier.
    pub id: AccountId,
    /// Sign-in email, if the account has one.
    #[serde(default)]
    pub email: Option<String>,
    /// Phone number stored on the account itself.
    #[serde(default)]
    pub phone: Option<String>,
    /// Metadata written at sign-up or by `update_user`.
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl Account {
    /// Creates an account with empty metadata.
    #[must_use]
    pub fn new(id: impl Into<AccountId>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
            phone: None,
            user_metadata: UserMetadata::default(),
        }
    }

    /// Returns the role declared in metadata, if any.
    ///
    /// An empty role string counts as undeclared.
    #[must_use]
    pub fn declared_role(&self) -> Option<Role> {
        non_empty(self.user_metadata.role.as_deref()).map(Role::from)
    }

    /// Display name derived from the account alone.
    ///
    /// Metadata `full_name` wins; otherwise the part of the email before
    /// `@`; otherwise an empty string.
    #[must_use]
    pub fn fallback_name(&self) -> String {
        if let Some(name) = non_empty(self.user_metadata.full_name.as_deref()) {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .unwrap_or_default()
            .to_string()
    }

    /// Phone from metadata, falling back to the account's own phone column.
    #[must_use]
    pub fn fallback_phone(&self) -> Option<&str> {
        non_empty(self.user_metadata.phone.as_deref()).or_else(|| non_empty(self.phone.as_deref()))
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
