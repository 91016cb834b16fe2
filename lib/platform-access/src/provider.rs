//! Capability contracts of the hosted identity provider.
//!
//! `IdentityProvider` is the client pathway every view goes through.
//! `PasswordGrant` is the raw token-endpoint call used only when that
//! pathway stalls during sign-in.

use crate::account::{Account, UserMetadata};
use crate::error::AuthenticationError;
use crate::profile::Profile;
use crate::role::Role;
use crate::session::{Session, SessionChange, TokenPair};
use async_trait::async_trait;
use chrono::Utc;
use rootcause::prelude::Report;
use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;
use tracing::warn;
use urbansetu_core::AccountId;

/// Email and password presented at sign-in.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Account creation request sent to the provider.
#[derive(Clone, Serialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Stored as the account's user metadata.
    pub data: UserMetadata,
}

impl fmt::Debug for SignUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignUp")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("phone", &self.phone)
            .field("data", &self.data)
            .finish()
    }
}

/// Fields collected by the registration form.
#[derive(Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub department: Option<String>,
}

impl Registration {
    /// Builds the sign-up request, embedding name/role/phone/department in
    /// account metadata.
    #[must_use]
    pub fn sign_up_request(&self) -> SignUp {
        SignUp {
            email: self.email.clone(),
            password: self.password.clone(),
            phone: self.phone.clone(),
            data: UserMetadata {
                role: Some(self.role.to_string()),
                full_name: Some(self.full_name.clone()),
                phone: self.phone.clone(),
                department: self.department.clone(),
                extra: Default::default(),
            },
        }
    }

    /// Builds the profile row written after sign-up.
    #[must_use]
    pub fn profile_for(&self, id: AccountId) -> Profile {
        Profile {
            id,
            full_name: Some(self.full_name.clone()),
            phone: self.phone.clone(),
            role: Some(self.role.clone()),
            department: self.department.clone(),
            email: Some(self.email.clone()),
            updated_at: Some(Utc::now()),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("full_name", &self.full_name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Changes to the signed-in account.
#[derive(Clone, Default, Serialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<UserMetadata>,
}

impl UserAttributes {
    /// A password change.
    #[must_use]
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            data: None,
        }
    }

    /// A metadata change.
    #[must_use]
    pub fn metadata(data: UserMetadata) -> Self {
        Self {
            password: None,
            data: Some(data),
        }
    }
}

impl fmt::Debug for UserAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAttributes")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("data", &self.data)
            .finish()
    }
}

/// Receiver for provider-pushed session changes.
#[derive(Debug)]
pub struct SessionChanges {
    receiver: broadcast::Receiver<SessionChange>,
}

impl SessionChanges {
    /// Wraps a broadcast receiver.
    #[must_use]
    pub fn new(receiver: broadcast::Receiver<SessionChange>) -> Self {
        Self { receiver }
    }

    /// Waits for the next change.
    ///
    /// Returns `None` once the provider has gone away. A receiver that fell
    /// behind skips what it missed and continues with the oldest retained
    /// change.
    pub async fn next(&mut self) -> Option<SessionChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session change receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// The identity provider's client pathway.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the current session, if any.
    async fn get_session(&self) -> Result<Option<Session>, Report<AuthenticationError>>;

    /// Subscribes to session-change notifications.
    fn subscribe(&self) -> SessionChanges;

    /// Signs in with email and password.
    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, Report<AuthenticationError>>;

    /// Installs a token pair obtained elsewhere as the active session.
    async fn set_session(&self, tokens: &TokenPair)
    -> Result<Session, Report<AuthenticationError>>;

    /// Revokes the active session.
    async fn sign_out(&self) -> Result<(), Report<AuthenticationError>>;

    /// Creates an account.
    async fn sign_up(&self, request: &SignUp) -> Result<Account, Report<AuthenticationError>>;

    /// Updates the signed-in account.
    async fn update_user(
        &self,
        attributes: &UserAttributes,
    ) -> Result<Account, Report<AuthenticationError>>;

    /// Sends a password-reset link.
    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), Report<AuthenticationError>>;

    /// Sends a one-time sign-in code by SMS.
    async fn sign_in_with_otp(&self, phone: &str) -> Result<(), Report<AuthenticationError>>;

    /// Exchanges an SMS code for a session.
    async fn verify_otp(
        &self,
        phone: &str,
        token: &str,
    ) -> Result<Session, Report<AuthenticationError>>;

    /// URL that starts a third-party sign-in redirect.
    fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> String;
}

/// Direct password grant against the provider's token endpoint.
#[async_trait]
pub trait PasswordGrant: Send + Sync {
    /// Exchanges credentials for a token pair.
    async fn password_grant(
        &self,
        credentials: &Credentials,
    ) -> Result<TokenPair, Report<AuthenticationError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionEvent;

    fn registration() -> Registration {
        Registration {
            email: "a@x.com".to_string(),
            password: "secret".to_string(),
            full_name: "Asha Rao".to_string(),
            phone: Some("+91 98765 43210".to_string()),
            role: Role::Citizen,
            department: None,
        }
    }

    #[test]
    fn sign_up_request_embeds_metadata() {
        let request = registration().sign_up_request();
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["email"], "a@x.com");
        assert_eq!(json["phone"], "+91 98765 43210");
        assert_eq!(json["data"]["role"], "citizen");
        assert_eq!(json["data"]["full_name"], "Asha Rao");
        assert!(json["data"].get("department").is_none());
    }

    #[test]
    fn profile_for_copies_registration() {
        let profile = registration().profile_for(AccountId::from("acc-1"));
        assert_eq!(profile.id.as_str(), "acc-1");
        assert_eq!(profile.role, Some(Role::Citizen));
        assert_eq!(profile.email.as_deref(), Some("a@x.com"));
        assert!(profile.updated_at.is_some());
    }

    #[test]
    fn debug_never_prints_passwords() {
        let creds = Credentials::new("a@x.com", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert!(!format!("{:?}", registration()).contains("secret"));
        assert!(!format!("{:?}", UserAttributes::password("hunter2")).contains("hunter2"));
    }

    #[tokio::test]
    async fn session_changes_skip_lagged_notifications() {
        let (tx, rx) = broadcast::channel(2);
        let mut changes = SessionChanges::new(rx);

        for _ in 0..3 {
            tx.send(SessionChange::new(SessionEvent::TokenRefreshed, None))
                .unwrap();
        }
        tx.send(SessionChange::new(SessionEvent::SignedOut, None))
            .unwrap();

        let first = changes.next().await.expect("change");
        assert_eq!(first.event, SessionEvent::TokenRefreshed);
        let second = changes.next().await.expect("change");
        assert_eq!(second.event, SessionEvent::SignedOut);

        drop(tx);
        assert!(changes.next().await.is_none());
    }
}
