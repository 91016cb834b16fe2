//! Session manager: owner of the authenticated-user state.
//!
//! The manager is the single writer of [`UserState`]. It reads any
//! existing session at startup, then a background listener applies
//! provider notifications and merges profile rows as they arrive. Views
//! read through cloned [`UserStateReader`]s.
//!
//! The listener task owns the provider subscription and every in-flight
//! profile fetch. Aborting it (teardown, or dropping the manager) releases
//! all of them at once.

use crate::account::Account;
use crate::error::ProfileError;
use crate::login::LoginOrchestrator;
use crate::profile::{Profile, ProfileStore, ProfileUpdate};
use crate::provider::{IdentityProvider, PasswordGrant, SessionChanges};
use crate::session::SessionChange;
use crate::state::{CurrentUser, StateAction, StateWriter, UserState, UserStateReader};
use rootcause::prelude::Report;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};

/// Scoped subscription to provider session changes.
///
/// Unsubscribes when dropped. `unsubscribe` may be called any number of
/// times.
#[derive(Debug)]
pub struct Subscription {
    listener: Option<AbortHandle>,
}

impl Subscription {
    fn new(listener: AbortHandle) -> Self {
        Self {
            listener: Some(listener),
        }
    }

    /// Stops delivering session changes.
    pub fn unsubscribe(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            debug!("unsubscribed from session changes");
        }
    }

    /// Returns true until `unsubscribe` has run.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.listener.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Owner of the process-wide authenticated-user state.
pub struct SessionManager<P, S> {
    provider: Arc<P>,
    profiles: Arc<S>,
    state: StateWriter,
    subscription: Subscription,
}

impl<P, S> SessionManager<P, S>
where
    P: IdentityProvider + 'static,
    S: ProfileStore + 'static,
{
    /// Establishes the initial state and starts listening for changes.
    ///
    /// Returns as soon as the existing session (if any) has been applied;
    /// `loading` is already false at that point. The profile fetch for a
    /// restored session completes in the background.
    #[instrument(skip_all)]
    pub async fn initialize(provider: Arc<P>, profiles: Arc<S>) -> Self {
        let state = StateWriter::new();
        let changes = provider.subscribe();

        let restored = match provider.get_session().await {
            Ok(Some(session)) => {
                let account = session.account().clone();
                info!(account_id = %account.id, "restored existing session");
                state.apply(StateAction::SessionRestored(account.clone()));
                Some(account)
            }
            Ok(None) => {
                debug!("no existing session");
                None
            }
            Err(report) => {
                error!(error = %report, "failed to read existing session");
                None
            }
        };
        state.apply(StateAction::LoadingFinished);

        let listener = tokio::spawn(listen(
            changes,
            Arc::clone(&profiles),
            state.clone(),
            restored,
        ));

        Self {
            provider,
            profiles,
            state,
            subscription: Subscription::new(listener.abort_handle()),
        }
    }

    /// Returns a reader for the user state.
    #[must_use]
    pub fn reader(&self) -> UserStateReader {
        self.state.reader()
    }

    /// Returns the current state.
    #[must_use]
    pub fn snapshot(&self) -> UserState {
        self.state.snapshot()
    }

    /// Returns the signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<CurrentUser> {
        self.state.snapshot().current_user().cloned()
    }

    /// Returns the shared provider client.
    #[must_use]
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Builds a login orchestrator that writes to this manager's state.
    #[must_use]
    pub fn orchestrator<G>(&self, fallback: G) -> LoginOrchestrator<P, S, G>
    where
        G: PasswordGrant,
    {
        LoginOrchestrator::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.profiles),
            fallback,
        )
        .with_state(self.state.clone())
    }

    /// Writes a profile change for the signed-in user and merges the
    /// re-read row into the state.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::NotSignedIn` without a current user, or the
    /// storage error if the write fails. A failed re-read is logged and
    /// leaves the user on account metadata.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), Report<ProfileError>> {
        let Some(user) = self.current_user() else {
            return Err(ProfileError::NotSignedIn.into());
        };
        self.profiles.update(user.id(), update).await?;
        info!(account_id = %user.id(), "profile updated");

        let fetched = fetch_profile(Arc::clone(&self.profiles), user.account().clone()).await;
        apply_fetch(&self.state, fetched);
        Ok(())
    }

    /// Stops listening for session changes. Safe to call more than once.
    pub fn teardown(&mut self) {
        self.subscription.unsubscribe();
    }

    /// Returns true until `teardown` has run.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.subscription.is_active()
    }
}

/// Result of one background profile read.
struct ProfileFetch {
    account: Account,
    result: Result<Option<Profile>, Report<ProfileError>>,
}

async fn fetch_profile<S>(profiles: Arc<S>, account: Account) -> ProfileFetch
where
    S: ProfileStore + ?Sized,
{
    let result = profiles.fetch(&account.id).await;
    ProfileFetch { account, result }
}

/// Merges a profile read into the state. Failures degrade to account
/// metadata and are only logged.
fn apply_fetch(state: &StateWriter, fetch: ProfileFetch) {
    let ProfileFetch { account, result } = fetch;
    let profile = match result {
        Ok(Some(profile)) => Some(profile),
        Ok(None) => {
            warn!(account_id = %account.id, "no profile row; using account metadata");
            None
        }
        Err(report) => {
            error!(account_id = %account.id, error = %report, "profile fetch failed; using account metadata");
            None
        }
    };
    state.apply(StateAction::ProfileLoaded { account, profile });
}

async fn listen<S>(
    mut changes: SessionChanges,
    profiles: Arc<S>,
    state: StateWriter,
    restored: Option<Account>,
) where
    S: ProfileStore + 'static,
{
    let mut fetches = JoinSet::new();
    if let Some(account) = restored {
        fetches.spawn(fetch_profile(Arc::clone(&profiles), account));
    }

    loop {
        tokio::select! {
            change = changes.next() => {
                let Some(change) = change else {
                    debug!("session change stream closed");
                    break;
                };
                if let Some(account) = handle_change(&state, change) {
                    fetches.spawn(fetch_profile(Arc::clone(&profiles), account));
                }
            }
            Some(joined) = fetches.join_next(), if !fetches.is_empty() => match joined {
                Ok(fetch) => apply_fetch(&state, fetch),
                Err(e) if e.is_cancelled() => {}
                Err(e) => error!(error = %e, "profile fetch task failed"),
            },
        }
    }

    while let Some(joined) = fetches.join_next().await {
        if let Ok(fetch) = joined {
            apply_fetch(&state, fetch);
        }
    }
}

/// Applies a notification. Returns the account whose profile should be
/// (re)fetched.
fn handle_change(state: &StateWriter, change: SessionChange) -> Option<Account> {
    let SessionChange { event, session } = change;
    match session {
        Some(session) => {
            let account = session.account().clone();
            debug!(%event, account_id = %account.id, "session changed");
            state.apply(StateAction::SessionChanged(account.clone()));
            Some(account)
        }
        None => {
            debug!(%event, "session cleared");
            state.apply(StateAction::SessionCleared);
            None
        }
    }
}
