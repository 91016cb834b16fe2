//! Sessions issued by the identity provider.
//!
//! A session is an access/refresh token pair plus the account it belongs
//! to. The application never mints tokens; it only asks the provider to
//! issue, renew, or revoke them, and may rebuild a `Session` from a token
//! pair that arrived through the direct token endpoint.

use crate::account::Account;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access and refresh tokens as returned by a token grant.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    /// Creates a token pair.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// An active authenticated session.
#[derive(Clone, PartialEq)]
pub struct Session {
    tokens: TokenPair,
    /// When the access token stops being accepted, if known.
    expires_at: Option<DateTime<Utc>>,
    account: Account,
}

impl Session {
    /// Creates a session with an explicit expiry.
    #[must_use]
    pub fn new(tokens: TokenPair, expires_at: Option<DateTime<Utc>>, account: Account) -> Self {
        Self {
            tokens,
            expires_at,
            account,
        }
    }

    /// Rebuilds a session from a bare token pair.
    ///
    /// The expiry is read from the access token's `exp` claim.
    #[must_use]
    pub fn from_tokens(tokens: TokenPair, account: Account) -> Self {
        let expires_at = access_token_expiry(&tokens.access_token);
        Self::new(tokens, expires_at, account)
    }

    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        &self.tokens.refresh_token
    }

    /// Returns the token pair.
    #[must_use]
    pub fn tokens(&self) -> &TokenPair {
        &self.tokens
    }

    /// Returns when the access token expires, if known.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns the authenticated account.
    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Returns true if the access token has expired.
    ///
    /// A session without a known expiry is treated as live.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }

    /// Replaces the embedded account after a user update.
    pub fn set_account(&mut self, account: Account) {
        self.account = account;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("tokens", &self.tokens)
            .field("expires_at", &self.expires_at)
            .field("account_id", &self.account.id)
            .finish()
    }
}

/// Reads the `exp` claim from a JWT access token without verifying it.
///
/// Returns `None` for anything that is not a three-part token with a
/// numeric `exp`.
#[must_use]
pub fn access_token_expiry(token: &str) -> Option<DateTime<Utc>> {
    #[derive(Deserialize)]
    struct Claims {
        exp: Option<i64>,
    }

    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

/// Kind of session-change notification pushed by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitialSession => "INITIAL_SESSION",
            Self::SignedIn => "SIGNED_IN",
            Self::SignedOut => "SIGNED_OUT",
            Self::TokenRefreshed => "TOKEN_REFRESHED",
            Self::UserUpdated => "USER_UPDATED",
            Self::PasswordRecovery => "PASSWORD_RECOVERY",
        };
        f.write_str(name)
    }
}

/// A session-change notification.
///
/// `session` is `None` when the change left no live session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

impl SessionChange {
    /// Creates a notification.
    #[must_use]
    pub fn new(event: SessionEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }
}
