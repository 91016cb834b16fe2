//! Admin complaint desk: load a complaint with its reporter and change its
//! status.

use crate::error::ComplaintError;
use crate::model::{Complaint, ComplaintStatus};
use crate::store::ComplaintStore;
use crate::timeline::Timeline;
use chrono::Utc;
use rootcause::prelude::Report;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use urbansetu_core::{AccountId, ComplaintId};
use urbansetu_platform_access::{Profile, ProfileStore};

/// Placeholder for fields the reporter never supplied.
const NOT_AVAILABLE: &str = "N/A";
const ANONYMOUS: &str = "Anonymous";

/// How to reach the citizen who filed a complaint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReporterContact {
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl ReporterContact {
    /// Contact shown when the reporter is unknown.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            name: ANONYMOUS.to_string(),
            phone: NOT_AVAILABLE.to_string(),
            email: NOT_AVAILABLE.to_string(),
        }
    }

    /// Contact taken from a profile row, with placeholders for blanks.
    #[must_use]
    pub fn from_profile(profile: &Profile) -> Self {
        fn or(value: Option<&String>, fallback: &str) -> String {
            value
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| fallback.to_string())
        }

        Self {
            name: or(profile.full_name.as_ref(), ANONYMOUS),
            phone: or(profile.phone.as_ref(), NOT_AVAILABLE),
            email: or(profile.email.as_ref(), NOT_AVAILABLE),
        }
    }
}

impl Default for ReporterContact {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// A complaint as the admin detail view shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplaintDetail {
    pub complaint: Complaint,
    pub reporter: ReporterContact,
}

impl ComplaintDetail {
    #[must_use]
    pub fn timeline(&self) -> Timeline {
        Timeline::for_complaint(&self.complaint)
    }
}

/// Loads complaints for review and applies status changes.
pub struct ComplaintDesk<C, S> {
    complaints: Arc<C>,
    profiles: Arc<S>,
}

impl<C, S> ComplaintDesk<C, S>
where
    C: ComplaintStore,
    S: ProfileStore,
{
    #[must_use]
    pub fn new(complaints: Arc<C>, profiles: Arc<S>) -> Self {
        Self {
            complaints,
            profiles,
        }
    }

    /// Loads a complaint and its reporter's contact details.
    ///
    /// A missing or unreadable reporter profile yields placeholder contact
    /// details rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `ComplaintError::NotFound` when no row matches, or the
    /// storage error.
    #[instrument(skip(self))]
    pub async fn load(&self, id: &ComplaintId) -> Result<ComplaintDetail, Report<ComplaintError>> {
        let complaint = self
            .complaints
            .fetch(id)
            .await?
            .ok_or_else(|| ComplaintError::NotFound { id: id.clone() })?;

        let reporter = match &complaint.user_id {
            Some(user_id) => self.reporter(user_id).await,
            None => ReporterContact::anonymous(),
        };

        Ok(ComplaintDetail {
            complaint,
            reporter,
        })
    }

    async fn reporter(&self, user_id: &AccountId) -> ReporterContact {
        match self.profiles.fetch(user_id).await {
            Ok(Some(profile)) => ReporterContact::from_profile(&profile),
            Ok(None) => ReporterContact::anonymous(),
            Err(report) => {
                warn!(account_id = %user_id, error = %report, "reporter profile unavailable");
                ReporterContact::anonymous()
            }
        }
    }

    /// Moves a complaint to `status` and stamps the update time.
    ///
    /// Returns `false` without touching storage when the status is
    /// unchanged. The local copy is updated only after the write succeeds.
    ///
    /// # Errors
    ///
    /// Returns the storage error; `complaint` is left as it was.
    #[instrument(skip(self, complaint), fields(complaint_id = %complaint.id, from = %complaint.status, to = %status))]
    pub async fn set_status(
        &self,
        complaint: &mut Complaint,
        status: ComplaintStatus,
    ) -> Result<bool, Report<ComplaintError>> {
        if complaint.status == status {
            return Ok(false);
        }

        let now = Utc::now();
        self.complaints
            .update_status(&complaint.id, status, now)
            .await?;
        complaint.status = status;
        complaint.updated_at = Some(now);
        info!(status = %status.label(), "complaint status updated");
        Ok(true)
    }
}
