//! In-memory provider, grant, and profile store for unit tests.

use crate::account::{Account, UserMetadata};
use crate::error::{AuthenticationError, ProfileError};
use crate::profile::{Profile, ProfileStore, ProfileUpdate};
use crate::provider::{
    Credentials, IdentityProvider, PasswordGrant, SessionChanges, SignUp, UserAttributes,
};
use crate::session::{Session, SessionChange, SessionEvent, TokenPair};
use async_trait::async_trait;
use rootcause::prelude::Report;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, broadcast};
use urbansetu_core::AccountId;

/// Builds an account whose metadata declares `role`.
pub(crate) fn account(id: &str, email: &str, role: Option<&str>) -> Account {
    Account {
        id: AccountId::from(id),
        email: Some(email.to_string()),
        phone: None,
        user_metadata: UserMetadata {
            role: role.map(str::to_string),
            ..UserMetadata::default()
        },
    }
}

pub(crate) fn session_for(account: Account) -> Session {
    let tokens = TokenPair::new(
        format!("access-{}", account.id),
        format!("refresh-{}", account.id),
    );
    Session::new(tokens, None, account)
}

/// How the fake answers `sign_in_with_password`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignInMode {
    Normal,
    Hang,
}

pub(crate) struct FakeProvider {
    users: Mutex<HashMap<String, (String, Account)>>,
    session: Mutex<Option<Session>>,
    changes: broadcast::Sender<SessionChange>,
    sign_in_mode: Mutex<SignInMode>,
    pub(crate) fail_get_session: AtomicBool,
    pub(crate) fail_set_session: AtomicBool,
    pub(crate) fail_sign_out: AtomicBool,
    pub(crate) sign_in_calls: AtomicUsize,
    pub(crate) set_session_calls: AtomicUsize,
    pub(crate) sign_out_calls: AtomicUsize,
    pub(crate) update_user_calls: AtomicUsize,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            users: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            changes,
            sign_in_mode: Mutex::new(SignInMode::Normal),
            fail_get_session: AtomicBool::new(false),
            fail_set_session: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            sign_in_calls: AtomicUsize::new(0),
            set_session_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            update_user_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_user(self, password: &str, account: Account) -> Self {
        let email = account.email.clone().unwrap_or_default();
        self.users
            .lock()
            .unwrap()
            .insert(email, (password.to_string(), account));
        self
    }

    pub(crate) fn with_session(self, account: Account) -> Self {
        *self.session.lock().unwrap() = Some(session_for(account));
        self
    }

    pub(crate) fn set_sign_in_mode(&self, mode: SignInMode) {
        *self.sign_in_mode.lock().unwrap() = mode;
    }

    pub(crate) fn current_session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    /// Pushes a notification as if it came from another tab.
    pub(crate) fn emit(&self, event: SessionEvent, session: Option<Session>) {
        let _ = self.changes.send(SessionChange::new(event, session));
    }

    fn install(&self, event: SessionEvent, session: Session) -> Session {
        *self.session.lock().unwrap() = Some(session.clone());
        self.emit(event, Some(session.clone()));
        session
    }

    fn account_for_token(&self, access_token: &str) -> Option<Account> {
        self.users
            .lock()
            .unwrap()
            .values()
            .map(|(_, account)| account.clone())
            .find(|account| format!("access-{}", account.id) == access_token)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_session(&self) -> Result<Option<Session>, Report<AuthenticationError>> {
        if self.fail_get_session.load(Ordering::SeqCst) {
            return Err(AuthenticationError::Transport {
                reason: "storage unavailable".to_string(),
            }
            .into());
        }
        Ok(self.current_session())
    }

    fn subscribe(&self) -> SessionChanges {
        SessionChanges::new(self.changes.subscribe())
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, Report<AuthenticationError>> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.sign_in_mode.lock().unwrap();
        if mode == SignInMode::Hang {
            std::future::pending::<()>().await;
        }
        let found = self.users.lock().unwrap().get(&credentials.email).cloned();
        match found {
            Some((password, account)) if password == credentials.password => {
                Ok(self.install(SessionEvent::SignedIn, session_for(account)))
            }
            _ => Err(AuthenticationError::Rejected {
                reason: "Invalid login credentials".to_string(),
            }
            .into()),
        }
    }

    async fn set_session(
        &self,
        tokens: &TokenPair,
    ) -> Result<Session, Report<AuthenticationError>> {
        self.set_session_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set_session.load(Ordering::SeqCst) {
            return Err(AuthenticationError::SessionInstall {
                reason: "refresh token revoked".to_string(),
            }
            .into());
        }
        let account = self
            .account_for_token(&tokens.access_token)
            .ok_or(AuthenticationError::NoAccount)?;
        Ok(self.install(SessionEvent::SignedIn, session_for(account)))
    }

    async fn sign_out(&self) -> Result<(), Report<AuthenticationError>> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthenticationError::SignOut {
                reason: "network down".to_string(),
            }
            .into());
        }
        *self.session.lock().unwrap() = None;
        self.emit(SessionEvent::SignedOut, None);
        Ok(())
    }

    async fn sign_up(&self, request: &SignUp) -> Result<Account, Report<AuthenticationError>> {
        if self.users.lock().unwrap().contains_key(&request.email) {
            return Err(AuthenticationError::Rejected {
                reason: "User already registered".to_string(),
            }
            .into());
        }
        let account = Account {
            id: AccountId::from(format!("acc-{}", request.email)),
            email: Some(request.email.clone()),
            phone: request.phone.clone(),
            user_metadata: request.data.clone(),
        };
        self.users.lock().unwrap().insert(
            request.email.clone(),
            (request.password.clone(), account.clone()),
        );
        Ok(account)
    }

    async fn update_user(
        &self,
        attributes: &UserAttributes,
    ) -> Result<Account, Report<AuthenticationError>> {
        self.update_user_calls.fetch_add(1, Ordering::SeqCst);
        let mut session = self
            .current_session()
            .ok_or(AuthenticationError::NotSignedIn)?;
        let mut account = session.account().clone();
        if let Some(data) = &attributes.data {
            if data.role.is_some() {
                account.user_metadata.role = data.role.clone();
            }
        }
        session.set_account(account.clone());
        self.install(SessionEvent::UserUpdated, session);
        Ok(account)
    }

    async fn reset_password_for_email(
        &self,
        _email: &str,
        _redirect_to: Option<&str>,
    ) -> Result<(), Report<AuthenticationError>> {
        Ok(())
    }

    async fn sign_in_with_otp(&self, _phone: &str) -> Result<(), Report<AuthenticationError>> {
        Ok(())
    }

    async fn verify_otp(
        &self,
        phone: &str,
        token: &str,
    ) -> Result<Session, Report<AuthenticationError>> {
        if token != "123456" {
            return Err(AuthenticationError::Rejected {
                reason: "Token has expired or is invalid".to_string(),
            }
            .into());
        }
        let mut account = Account::new(format!("acc-{phone}"), None);
        account.phone = Some(phone.to_string());
        Ok(self.install(SessionEvent::SignedIn, session_for(account)))
    }

    fn authorize_url(&self, provider: &str, _redirect_to: Option<&str>) -> String {
        format!("https://fake.local/authorize?provider={provider}")
    }
}

/// Token-endpoint fake with a fixed answer.
pub(crate) struct FakeGrant {
    answer: Result<TokenPair, AuthenticationError>,
    pub(crate) calls: AtomicUsize,
}

impl FakeGrant {
    pub(crate) fn issuing(tokens: TokenPair) -> Self {
        Self {
            answer: Ok(tokens),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(error: AuthenticationError) -> Self {
        Self {
            answer: Err(error),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PasswordGrant for FakeGrant {
    async fn password_grant(
        &self,
        _credentials: &Credentials,
    ) -> Result<TokenPair, Report<AuthenticationError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().map_err(Into::into)
    }
}

#[derive(Default)]
pub(crate) struct FakeProfiles {
    rows: Mutex<HashMap<AccountId, Profile>>,
    pub(crate) fail_fetch: AtomicBool,
    pub(crate) fail_upsert: AtomicBool,
    pub(crate) fetch_calls: AtomicUsize,
    /// When set, fetches wait for a permit before answering.
    pub(crate) gate: Option<Arc<Notify>>,
}

impl FakeProfiles {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_row(self, profile: Profile) -> Self {
        self.rows
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile);
        self
    }

    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn row(&self, id: &AccountId) -> Option<Profile> {
        self.rows.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl ProfileStore for FakeProfiles {
    async fn fetch(&self, id: &AccountId) -> Result<Option<Profile>, Report<ProfileError>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ProfileError::Storage {
                reason: "permission denied for table profiles".to_string(),
            }
            .into());
        }
        Ok(self.row(id))
    }

    async fn upsert(&self, profile: &Profile) -> Result<(), Report<ProfileError>> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(ProfileError::Storage {
                reason: "duplicate key".to_string(),
            }
            .into());
        }
        self.rows
            .lock()
            .unwrap()
            .insert(profile.id.clone(), profile.clone());
        Ok(())
    }

    async fn update(
        &self,
        id: &AccountId,
        update: &ProfileUpdate,
    ) -> Result<(), Report<ProfileError>> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(id).ok_or_else(|| ProfileError::NotFound {
            account_id: id.clone(),
        })?;
        if let Some(name) = &update.full_name {
            row.full_name = Some(name.clone());
        }
        if let Some(phone) = &update.phone {
            row.phone = Some(phone.clone());
        }
        if let Some(department) = &update.department {
            row.department = Some(department.clone());
        }
        if let Some(email) = &update.email {
            row.email = Some(email.clone());
        }
        Ok(())
    }
}
