//! Complaint records as stored in the `complaints` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use urbansetu_core::{AccountId, ComplaintId};

/// Processing state of a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    /// Filed, not yet picked up.
    #[default]
    Pending,
    /// Forwarded to the responsible department.
    InProgress,
    /// The department marked the issue fixed.
    Resolved,
    /// Closed without further action.
    Closed,
}

impl ComplaintStatus {
    /// All statuses in workflow order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::InProgress, Self::Resolved, Self::Closed];

    /// Returns the stored value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Returns a human-readable label ("in progress").
    #[must_use]
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Returns true if the department has taken the complaint on.
    #[must_use]
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Self::InProgress | Self::Resolved)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency assigned to a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filed complaint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: ComplaintId,
    /// Reporting account. Absent for anonymous reports.
    #[serde(default)]
    pub user_id: Option<AccountId>,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub status: ComplaintStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Classifier output attached at submission, kept as raw JSON.
    #[serde(default)]
    pub ai_prediction: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Complaint {
    /// Short heading: the category and the first segment of the address.
    #[must_use]
    pub fn title(&self) -> String {
        let place = self
            .address
            .as_deref()
            .filter(|address| !address.is_empty())
            .and_then(|address| address.split(',').next())
            .unwrap_or("Location");
        format!("{} at {}", self.category, place)
    }

    /// Returns the department name, or a placeholder when unassigned.
    #[must_use]
    pub fn department_or_default(&self) -> &str {
        self.department
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or("the concerned department")
    }
}
