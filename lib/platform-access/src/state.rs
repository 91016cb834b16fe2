//! Process-wide authenticated-user state.
//!
//! Two asynchronous writers feed this state: provider session
//! notifications (account data) and background profile fetches (profile
//! data). Both go through `UserState::apply`, which is the only place the
//! precedence between them is decided:
//!
//! - account data always replaces account data;
//! - a profile row, once loaded for the current account, wins for `role`
//!   and `name` and survives later notifications for the same account;
//! - a profile result for an account that is no longer current is dropped.
//!
//! Out-of-order profile results for the same account are not reordered;
//! the last one applied wins.

use crate::account::{Account, non_empty};
use crate::profile::Profile;
use crate::role::Role;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;
use urbansetu_core::AccountId;

/// The signed-in user as the views see it.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    account: Account,
    profile: Option<Profile>,
    name: String,
    role: Role,
    phone: String,
    department: Option<String>,
}

impl CurrentUser {
    /// Derives a user from account data alone.
    #[must_use]
    pub fn from_account(account: Account) -> Self {
        Self {
            name: account.fallback_name(),
            role: account.declared_role().unwrap_or_default(),
            phone: account.fallback_phone().unwrap_or_default().to_string(),
            department: account.user_metadata.department.clone(),
            account,
            profile: None,
        }
    }

    /// Derives a user from account data overlaid with its profile row.
    #[must_use]
    pub fn with_profile(account: Account, profile: Profile) -> Self {
        let name = non_empty(profile.full_name.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| account.fallback_name());
        let role = profile
            .role
            .clone()
            .or_else(|| account.declared_role())
            .unwrap_or_default();
        let phone = non_empty(profile.phone.as_deref())
            .or_else(|| account.fallback_phone())
            .unwrap_or_default()
            .to_string();
        let department = profile
            .department
            .clone()
            .or_else(|| account.user_metadata.department.clone());
        Self {
            account,
            profile: Some(profile),
            name,
            role,
            phone,
            department,
        }
    }

    /// Swaps in fresher account data, keeping any loaded profile.
    #[must_use]
    fn rebase(self, account: Account) -> Self {
        match self.profile {
            Some(profile) => Self::with_profile(account, profile),
            None => Self::from_account(account),
        }
    }

    #[must_use]
    pub fn id(&self) -> &AccountId {
        &self.account.id
    }

    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }

    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Contact phone, empty when unknown.
    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }

    #[must_use]
    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.account.email.as_deref()
    }

    /// Returns true once a profile row has been merged in.
    ///
    /// False means the user is running on account metadata only.
    #[must_use]
    pub fn is_profile_backed(&self) -> bool {
        self.profile.is_some()
    }
}

/// Inputs to the user-state reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum StateAction {
    /// An existing session was found at startup.
    SessionRestored(Account),
    /// The provider reported a live session.
    SessionChanged(Account),
    /// The provider reported that no session remains, or logout completed.
    SessionCleared,
    /// A profile fetch for `account` finished. `None` means no usable row.
    ProfileLoaded {
        account: Account,
        profile: Option<Profile>,
    },
    LoadingStarted,
    LoadingFinished,
}

/// Snapshot of the authenticated-user state.
#[derive(Debug, Clone, PartialEq)]
pub struct UserState {
    current: Option<CurrentUser>,
    loading: bool,
}

impl UserState {
    /// State before the session manager has looked for a session.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            current: None,
            loading: true,
        }
    }

    #[must_use]
    pub fn current_user(&self) -> Option<&CurrentUser> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.is_some()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Applies an action. Returns true if the state changed.
    pub fn apply(&mut self, action: StateAction) -> bool {
        let before = self.clone();
        match action {
            StateAction::SessionRestored(account) => {
                self.current = Some(CurrentUser::from_account(account));
            }
            StateAction::SessionChanged(account) => {
                self.current = Some(match self.current.take() {
                    Some(previous) if previous.id() == &account.id => previous.rebase(account),
                    _ => CurrentUser::from_account(account),
                });
            }
            StateAction::SessionCleared => {
                self.current = None;
                self.loading = false;
            }
            StateAction::ProfileLoaded { account, profile } => {
                if self.current.as_ref().map(CurrentUser::id) != Some(&account.id) {
                    debug!(account_id = %account.id, "dropping profile for account that is no longer current");
                    return false;
                }
                // The current account may be newer than the one the fetch started from.
                let account = self
                    .current
                    .as_ref()
                    .map_or(account, |current| current.account().clone());
                self.current = Some(match profile {
                    Some(profile) => CurrentUser::with_profile(account, profile),
                    None => CurrentUser::from_account(account),
                });
            }
            StateAction::LoadingStarted => self.loading = true,
            StateAction::LoadingFinished => self.loading = false,
        }
        *self != before
    }
}

impl Default for UserState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Write side of the user state. Held only by the session manager and the
/// orchestrators it hands out.
#[derive(Debug, Clone)]
pub(crate) struct StateWriter {
    sender: Arc<watch::Sender<UserState>>,
}

impl StateWriter {
    pub(crate) fn new() -> Self {
        let (sender, _receiver) = watch::channel(UserState::initial());
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Applies an action, waking readers only if something changed.
    pub(crate) fn apply(&self, action: StateAction) -> bool {
        self.sender.send_if_modified(|state| state.apply(action))
    }

    pub(crate) fn snapshot(&self) -> UserState {
        self.sender.borrow().clone()
    }

    pub(crate) fn reader(&self) -> UserStateReader {
        UserStateReader {
            receiver: self.sender.subscribe(),
        }
    }
}

/// Read access to the user state, cloned freely into every view.
#[derive(Debug, Clone)]
pub struct UserStateReader {
    receiver: watch::Receiver<UserState>,
}

impl UserStateReader {
    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> UserState {
        self.receiver.borrow().clone()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<CurrentUser> {
        self.receiver.borrow().current.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.receiver.borrow().is_authenticated()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.receiver.borrow().is_loading()
    }

    /// Waits for the next change. Returns false once the writer is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Waits until `predicate` holds and returns that state.
    ///
    /// Returns `None` if the writer goes away first.
    pub async fn wait_until<F>(&mut self, mut predicate: F) -> Option<UserState>
    where
        F: FnMut(&UserState) -> bool,
    {
        self.receiver
            .wait_for(|state| predicate(state))
            .await
            .ok()
            .map(|state| state.clone())
    }
}
