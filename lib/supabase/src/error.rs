//! Error types for the supabase crate.
//!
//! Auth endpoints report `AuthenticationError` directly. Row access goes
//! through `RestError`, which each table converts into its own domain
//! error.

use std::fmt;

/// Errors from `/rest/v1` row access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestError {
    /// The request never got an HTTP answer.
    Transport { reason: String },
    /// The row store answered with a non-success status.
    Status { status: u16, message: String },
    /// The body did not match the expected row shape.
    InvalidResponse { reason: String },
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { reason } => write!(f, "row store unreachable: {reason}"),
            Self::Status { status, message } => {
                write!(f, "row store returned {status}: {message}")
            }
            Self::InvalidResponse { reason } => {
                write!(f, "unexpected row store response: {reason}")
            }
        }
    }
}

impl std::error::Error for RestError {}
