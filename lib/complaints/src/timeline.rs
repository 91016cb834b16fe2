//! Progress timeline shown to the reporting citizen.
//!
//! The timeline is derived from the complaint's status and timestamps; the
//! table stores no history of its own. Comments are appended locally.

use crate::model::{Complaint, ComplaintStatus};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Delay shown between registration and forwarding, in minutes.
pub const FORWARDING_DELAY_MINUTES: i64 = 60;

/// Kind of timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Registered,
    Forwarded,
    Resolved,
    Comment,
}

/// One step in a complaint's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub stage: Stage,
    pub title: String,
    pub description: String,
    pub at: DateTime<Utc>,
    /// Who performed the step.
    pub actor: String,
}

/// Ordered history of a complaint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    /// Builds the timeline implied by a complaint's current status.
    #[must_use]
    pub fn for_complaint(complaint: &Complaint) -> Self {
        let mut entries = vec![TimelineEntry {
            stage: Stage::Registered,
            title: "Complaint Registered".to_string(),
            description: "Your complaint has been successfully registered.".to_string(),
            at: complaint.created_at,
            actor: "System".to_string(),
        }];

        if complaint.status.is_forwarded() {
            entries.push(TimelineEntry {
                stage: Stage::Forwarded,
                title: "Forwarded to Department".to_string(),
                description: format!(
                    "Complaint forwarded to {}.",
                    complaint.department_or_default()
                ),
                at: complaint.created_at + Duration::minutes(FORWARDING_DELAY_MINUTES),
                actor: "System".to_string(),
            });
        }

        if complaint.status == ComplaintStatus::Resolved {
            entries.push(TimelineEntry {
                stage: Stage::Resolved,
                title: "Issue Resolved".to_string(),
                description: "The issue has been marked as resolved.".to_string(),
                at: complaint.updated_at.unwrap_or(complaint.created_at),
                actor: "Department Officer".to_string(),
            });
        }

        Self { entries }
    }

    /// Appends a comment. Blank text is ignored; returns whether an entry
    /// was added.
    pub fn add_comment(&mut self, text: &str, author: &str, at: DateTime<Utc>) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let author = if author.trim().is_empty() { "You" } else { author };
        self.entries.push(TimelineEntry {
            stage: Stage::Comment,
            title: "Comment Added".to_string(),
            description: text.to_string(),
            at,
            actor: author.to_string(),
        });
        true
    }

    #[must_use]
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shorthand for [`Timeline::for_complaint`].
#[must_use]
pub fn timeline(complaint: &Complaint) -> Timeline {
    Timeline::for_complaint(complaint)
}
