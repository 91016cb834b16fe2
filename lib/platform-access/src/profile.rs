//! Application-owned profile records.
//!
//! A profile row enriches an account with display fields and the role the
//! application should act on. It may be missing (the sign-up trigger did
//! not run, or the read failed); callers fall back to account metadata.

use crate::error::ProfileError;
use crate::role::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use urbansetu_core::AccountId;

/// A row in the `profiles` table, keyed by account id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: AccountId,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Creates an empty profile for an account.
    #[must_use]
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            full_name: None,
            phone: None,
            role: None,
            department: None,
            email: None,
            updated_at: None,
        }
    }
}

/// Partial update to a profile row. Only present fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ProfileUpdate {
    /// Returns true if the update would not change anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone.is_none()
            && self.department.is_none()
            && self.email.is_none()
    }
}

/// Storage for profile rows.
///
/// Implemented over the hosted row store in production and in memory in
/// tests.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Reads the profile for an account. `Ok(None)` means no row exists.
    async fn fetch(&self, id: &AccountId) -> Result<Option<Profile>, Report<ProfileError>>;

    /// Inserts the profile or merges it into an existing row.
    async fn upsert(&self, profile: &Profile) -> Result<(), Report<ProfileError>>;

    /// Applies a partial update to an existing row.
    async fn update(
        &self,
        id: &AccountId,
        update: &ProfileUpdate,
    ) -> Result<(), Report<ProfileError>>;
}
