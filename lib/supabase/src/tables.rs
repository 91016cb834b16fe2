//! Typed access to the `profiles` and `complaints` tables.

use crate::error::RestError;
use crate::rest::{RestClient, eq};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use serde::Serialize;
use tracing::instrument;
use urbansetu_complaints::{Complaint, ComplaintError, ComplaintStatus, ComplaintStore};
use urbansetu_core::{AccountId, ComplaintId};
use urbansetu_platform_access::{Profile, ProfileError, ProfileStore, ProfileUpdate};

const PROFILES: &str = "profiles";
const COMPLAINTS: &str = "complaints";

fn profile_error(report: &Report<RestError>) -> ProfileError {
    match report.current_context() {
        RestError::InvalidResponse { reason } => ProfileError::InvalidResponse {
            reason: reason.clone(),
        },
        other => ProfileError::Storage {
            reason: other.to_string(),
        },
    }
}

fn complaint_error(report: &Report<RestError>) -> ComplaintError {
    match report.current_context() {
        RestError::InvalidResponse { reason } => ComplaintError::InvalidResponse {
            reason: reason.clone(),
        },
        other => ComplaintError::Storage {
            reason: other.to_string(),
        },
    }
}

/// The `profiles` table.
#[derive(Clone)]
pub struct ProfileTable {
    rest: RestClient,
}

impl ProfileTable {
    #[must_use]
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ProfileStore for ProfileTable {
    #[instrument(skip(self))]
    async fn fetch(&self, id: &AccountId) -> Result<Option<Profile>, Report<ProfileError>> {
        let rows: Vec<Profile> = self
            .rest
            .select(PROFILES, &[("id", eq(id))])
            .await
            .map_err(|report| profile_error(&report))?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip_all, fields(account_id = %profile.id))]
    async fn upsert(&self, profile: &Profile) -> Result<(), Report<ProfileError>> {
        self.rest
            .upsert(PROFILES, profile)
            .await
            .map_err(|report| profile_error(&report))?;
        Ok(())
    }

    #[instrument(skip(self, update))]
    async fn update(
        &self,
        id: &AccountId,
        update: &ProfileUpdate,
    ) -> Result<(), Report<ProfileError>> {
        if update.is_empty() {
            return Ok(());
        }
        let changed = self
            .rest
            .update(PROFILES, &[("id", eq(id))], update)
            .await
            .map_err(|report| profile_error(&report))?;
        if changed == 0 {
            return Err(ProfileError::NotFound {
                account_id: id.clone(),
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusPatch {
    status: ComplaintStatus,
    updated_at: DateTime<Utc>,
}

/// The `complaints` table.
#[derive(Clone)]
pub struct ComplaintTable {
    rest: RestClient,
}

impl ComplaintTable {
    #[must_use]
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ComplaintStore for ComplaintTable {
    #[instrument(skip(self))]
    async fn fetch(&self, id: &ComplaintId) -> Result<Option<Complaint>, Report<ComplaintError>> {
        let rows: Vec<Complaint> = self
            .rest
            .select(COMPLAINTS, &[("id", eq(id))])
            .await
            .map_err(|report| complaint_error(&report))?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        id: &ComplaintId,
        status: ComplaintStatus,
        at: DateTime<Utc>,
    ) -> Result<(), Report<ComplaintError>> {
        let patch = StatusPatch {
            status,
            updated_at: at,
        };
        let changed = self
            .rest
            .update(COMPLAINTS, &[("id", eq(id))], &patch)
            .await
            .map_err(|report| complaint_error(&report))?;
        if changed == 0 {
            return Err(ComplaintError::NotFound { id: id.clone() }.into());
        }
        Ok(())
    }
}
