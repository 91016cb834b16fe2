//! Storage seam for complaint rows.

use crate::error::ComplaintError;
use crate::model::{Complaint, ComplaintStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use urbansetu_core::ComplaintId;

/// Access to the `complaints` table.
#[async_trait]
pub trait ComplaintStore: Send + Sync {
    /// Reads one complaint. `Ok(None)` when no row matches.
    async fn fetch(&self, id: &ComplaintId) -> Result<Option<Complaint>, Report<ComplaintError>>;

    /// Writes a new status and its update time.
    async fn update_status(
        &self,
        id: &ComplaintId,
        status: ComplaintStatus,
        at: DateTime<Utc>,
    ) -> Result<(), Report<ComplaintError>>;
}
