//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `AuthenticationError`: sign-in, session, and account failures
//! - `ProfileError`: failures reading or writing profile rows

use crate::role::Role;
use std::fmt;
use urbansetu_core::AccountId;

/// Errors from authentication operations.
///
/// The `Display` text is what the login surface shows to the user, so
/// variants carrying a provider message render that message as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The provider definitively rejected the request (e.g. wrong password).
    Rejected { reason: String },
    /// The direct token endpoint answered with a non-success status.
    TokenEndpoint { status: u16, message: String },
    /// Installing fallback tokens as the active session failed.
    SessionInstall { reason: String },
    /// No authenticated account resulted from sign-in.
    NoAccount,
    /// The account is registered under a different role than requested.
    RoleMismatch { expected: Role, actual: Role },
    /// Provider base URL or API key is not configured.
    Configuration { missing: String },
    /// The provider could not be reached.
    Transport { reason: String },
    /// The provider answered with a body we could not understand.
    InvalidResponse { reason: String },
    /// The operation requires a live session.
    NotSignedIn,
    /// Revoking the session failed.
    SignOut { reason: String },
    /// Caller-supplied input was refused before reaching the provider.
    InvalidInput { reason: String },
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { reason } => write!(f, "{reason}"),
            Self::TokenEndpoint { message, .. } => write!(f, "{message}"),
            Self::SessionInstall { reason } => {
                write!(f, "failed to install session: {reason}")
            }
            Self::NoAccount => write!(f, "authentication failed: no account returned"),
            Self::RoleMismatch { expected, actual } => {
                write!(
                    f,
                    "unauthorized for role '{expected}': account is registered as '{actual}'"
                )
            }
            Self::Configuration { missing } => {
                write!(f, "identity provider is not configured: missing {missing}")
            }
            Self::Transport { reason } => {
                write!(f, "could not reach identity provider: {reason}")
            }
            Self::InvalidResponse { reason } => {
                write!(f, "unexpected identity provider response: {reason}")
            }
            Self::NotSignedIn => write!(f, "no active session"),
            Self::SignOut { reason } => write!(f, "failed to sign out: {reason}"),
            Self::InvalidInput { reason } => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors from profile storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// No profile row exists for the account.
    NotFound { account_id: AccountId },
    /// The row store refused or failed the request.
    Storage { reason: String },
    /// The row store answered with a body we could not understand.
    InvalidResponse { reason: String },
    /// A profile operation was attempted without a signed-in user.
    NotSignedIn,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { account_id } => {
                write!(f, "profile not found for account {account_id}")
            }
            Self::Storage { reason } => write!(f, "profile storage error: {reason}"),
            Self::InvalidResponse { reason } => {
                write!(f, "unexpected profile response: {reason}")
            }
            Self::NotSignedIn => write!(f, "no signed-in user"),
        }
    }
}

impl std::error::Error for ProfileError {}
