//! Error types for the complaints crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ComplaintError`: failures loading or updating complaint rows

use std::fmt;
use urbansetu_core::ComplaintId;

/// Errors from complaint storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplaintError {
    /// No complaint exists with the given id.
    NotFound { id: ComplaintId },
    /// The row store refused or failed the request.
    Storage { reason: String },
    /// The row store answered with a body we could not understand.
    InvalidResponse { reason: String },
}

impl fmt::Display for ComplaintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "complaint not found: {id}"),
            Self::Storage { reason } => write!(f, "complaint storage failed: {reason}"),
            Self::InvalidResponse { reason } => {
                write!(f, "unexpected complaint storage response: {reason}")
            }
        }
    }
}

impl std::error::Error for ComplaintError {}
