//! Login orchestration: primary sign-in with a deadline, direct token
//! endpoint fallback, and the role check that guards every login.
//!
//! Every operation returns an [`AuthOutcome`]. Provider and network errors
//! are logged here and converted to a failure message; nothing propagates
//! past this boundary.

use crate::account::Account;
use crate::error::AuthenticationError;
use crate::profile::ProfileStore;
use crate::provider::{Credentials, IdentityProvider, PasswordGrant, Registration, UserAttributes};
use crate::race::{PRIMARY_SIGN_IN_TIMEOUT, Raced, race_deadline};
use crate::role::Role;
use crate::session::Session;
use crate::state::{StateAction, StateWriter};
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Minimum accepted length for a new password.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Result of an orchestrator operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome<T> {
    Success(T),
    Failure { error: String },
}

impl<T> AuthOutcome<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the failure message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error } => Some(error),
        }
    }

    /// Returns the success value, if any.
    #[must_use]
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure { .. } => None,
        }
    }

    /// Converts a result, logging the failure under `operation`.
    ///
    /// The message is the innermost error's display text, which is what the
    /// login surface shows.
    pub fn from_result(result: Result<T, Report<AuthenticationError>>, operation: &str) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(report) => {
                error!(operation, error = %report, "authentication operation failed");
                Self::Failure {
                    error: report.current_context().to_string(),
                }
            }
        }
    }
}

/// Sign-in, registration, and sign-out against the identity provider.
pub struct LoginOrchestrator<P, S, G> {
    provider: Arc<P>,
    profiles: Arc<S>,
    fallback: G,
    state: Option<StateWriter>,
}

impl<P, S, G> LoginOrchestrator<P, S, G>
where
    P: IdentityProvider,
    S: ProfileStore,
    G: PasswordGrant,
{
    /// Creates an orchestrator that does not touch any user state.
    ///
    /// Use `SessionManager::orchestrator` to get one that clears the state
    /// on logout and toggles `loading` while signing in.
    #[must_use]
    pub fn new(provider: Arc<P>, profiles: Arc<S>, fallback: G) -> Self {
        Self {
            provider,
            profiles,
            fallback,
            state: None,
        }
    }

    pub(crate) fn with_state(mut self, state: StateWriter) -> Self {
        self.state = Some(state);
        self
    }

    fn apply(&self, action: StateAction) {
        if let Some(state) = &self.state {
            state.apply(action);
        }
    }

    /// Signs in and checks that the account is registered as `expected_role`.
    ///
    /// The primary pathway gets [`PRIMARY_SIGN_IN_TIMEOUT`]. A definitive
    /// answer within that window is final; only a stall hands the attempt
    /// to the token endpoint. The user state is populated by the provider's
    /// session notification, not by this call.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        expected_role: &Role,
    ) -> AuthOutcome<Account> {
        self.apply(StateAction::LoadingStarted);
        let credentials = Credentials::new(email, password);
        let result = self.try_login(&credentials, expected_role).await;
        self.apply(StateAction::LoadingFinished);
        AuthOutcome::from_result(result, "login")
    }

    async fn try_login(
        &self,
        credentials: &Credentials,
        expected_role: &Role,
    ) -> Result<Account, Report<AuthenticationError>> {
        let primary = self.provider.sign_in_with_password(credentials);
        let session = match race_deadline(primary, PRIMARY_SIGN_IN_TIMEOUT).await {
            Raced::Completed(result) => result?,
            Raced::TimedOut => {
                warn!(
                    timeout_ms = PRIMARY_SIGN_IN_TIMEOUT.as_millis() as u64,
                    "primary sign-in stalled; using token endpoint"
                );
                self.sign_in_via_token_endpoint(credentials).await?
            }
        };

        let account = session.account().clone();
        self.ensure_role(&account, expected_role).await?;
        info!(account_id = %account.id, "signed in");
        Ok(account)
    }

    async fn sign_in_via_token_endpoint(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, Report<AuthenticationError>> {
        let tokens = self.fallback.password_grant(credentials).await?;
        let session = self.provider.set_session(&tokens).await?;
        debug!(account_id = %session.account().id, "installed session from token endpoint");
        Ok(session)
    }

    /// Signs the account back out when it declares a role other than
    /// `expected`. An account with no declared role passes.
    async fn ensure_role(
        &self,
        account: &Account,
        expected: &Role,
    ) -> Result<(), Report<AuthenticationError>> {
        let Some(actual) = account.declared_role() else {
            return Ok(());
        };
        if &actual == expected {
            return Ok(());
        }

        warn!(account_id = %account.id, %expected, %actual, "role mismatch; signing out");
        if let Err(report) = self.provider.sign_out().await {
            error!(account_id = %account.id, error = %report, "sign-out after role mismatch failed");
        }
        Err(AuthenticationError::RoleMismatch {
            expected: expected.clone(),
            actual,
        }
        .into())
    }

    /// Creates an account, then writes its profile row.
    ///
    /// A failed profile write is logged and does not fail registration.
    #[instrument(skip_all, fields(role = %registration.role))]
    pub async fn register(&self, registration: &Registration) -> AuthOutcome<Account> {
        self.apply(StateAction::LoadingStarted);
        let result = self.try_register(registration).await;
        self.apply(StateAction::LoadingFinished);
        AuthOutcome::from_result(result, "register")
    }

    async fn try_register(
        &self,
        registration: &Registration,
    ) -> Result<Account, Report<AuthenticationError>> {
        let account = self
            .provider
            .sign_up(&registration.sign_up_request())
            .await?;
        info!(account_id = %account.id, "account created");

        let profile = registration.profile_for(account.id.clone());
        if let Err(report) = self.profiles.upsert(&profile).await {
            error!(account_id = %account.id, error = %report, "profile write after sign-up failed");
        }
        Ok(account)
    }

    /// Revokes the session. The user state is cleared only once the
    /// provider confirms.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> AuthOutcome<()> {
        let result = self.provider.sign_out().await;
        if result.is_ok() {
            self.apply(StateAction::SessionCleared);
            info!("signed out");
        }
        AuthOutcome::from_result(result, "logout")
    }

    /// Sends a one-time sign-in code to `phone`.
    #[instrument(skip(self))]
    pub async fn request_otp(&self, phone: &str) -> AuthOutcome<()> {
        let result = self.provider.sign_in_with_otp(phone).await;
        AuthOutcome::from_result(result, "request_otp")
    }

    /// Exchanges an SMS code for a session.
    ///
    /// An account that has never declared a role gets `role` stamped into
    /// its metadata.
    #[instrument(skip(self, token))]
    pub async fn verify_otp(&self, phone: &str, token: &str, role: &Role) -> AuthOutcome<Account> {
        self.apply(StateAction::LoadingStarted);
        let result = self.try_verify_otp(phone, token, role).await;
        self.apply(StateAction::LoadingFinished);
        AuthOutcome::from_result(result, "verify_otp")
    }

    async fn try_verify_otp(
        &self,
        phone: &str,
        token: &str,
        role: &Role,
    ) -> Result<Account, Report<AuthenticationError>> {
        let session = self.provider.verify_otp(phone, token).await?;
        let account = session.account().clone();
        if account.declared_role().is_some() {
            return Ok(account);
        }

        let mut metadata = account.user_metadata.clone();
        metadata.role = Some(role.to_string());
        let account = self
            .provider
            .update_user(&UserAttributes::metadata(metadata))
            .await?;
        debug!(account_id = %account.id, %role, "stamped role on new phone account");
        Ok(account)
    }

    /// Sends a password-reset link to `email`.
    #[instrument(skip(self))]
    pub async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> AuthOutcome<()> {
        let result = self
            .provider
            .reset_password_for_email(email, redirect_to)
            .await;
        AuthOutcome::from_result(result, "request_password_reset")
    }

    /// Sets a new password on the signed-in account.
    #[instrument(skip_all)]
    pub async fn update_password(&self, new_password: &str) -> AuthOutcome<()> {
        let result = self.try_update_password(new_password).await;
        AuthOutcome::from_result(result, "update_password")
    }

    async fn try_update_password(
        &self,
        new_password: &str,
    ) -> Result<(), Report<AuthenticationError>> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthenticationError::InvalidInput {
                reason: format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            }
            .into());
        }
        if self.provider.get_session().await?.is_none() {
            return Err(AuthenticationError::NotSignedIn.into());
        }
        self.provider
            .update_user(&UserAttributes::password(new_password))
            .await?;
        info!("password updated");
        Ok(())
    }

    /// Returns the URL that starts a third-party sign-in.
    ///
    /// The resulting session arrives later through the provider's change
    /// notifications.
    pub fn oauth_url(&self, provider: &str, redirect_to: Option<&str>) -> AuthOutcome<String> {
        let provider = provider.trim();
        if provider.is_empty() {
            return AuthOutcome::from_result(
                Err(AuthenticationError::InvalidInput {
                    reason: "sign-in provider is required".to_string(),
                }
                .into()),
                "oauth_url",
            );
        }
        AuthOutcome::Success(self.provider.authorize_url(provider, redirect_to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionManager;
    use crate::session::TokenPair;
    use crate::state::CurrentUser;
    use crate::test_support::{FakeGrant, FakeProfiles, FakeProvider, SignInMode, account};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::Instant;
    use urbansetu_core::AccountId;

    type Orchestrator = LoginOrchestrator<FakeProvider, FakeProfiles, FakeGrant>;

    fn citizen_provider() -> FakeProvider {
        FakeProvider::new().with_user("secret", account("acc-1", "a@x.com", Some("citizen")))
    }

    fn orchestrator(provider: FakeProvider, grant: FakeGrant) -> (Orchestrator, Arc<FakeProvider>) {
        let provider = Arc::new(provider);
        let orchestrator =
            LoginOrchestrator::new(Arc::clone(&provider), Arc::new(FakeProfiles::new()), grant);
        (orchestrator, provider)
    }

    fn fallback_tokens() -> FakeGrant {
        FakeGrant::issuing(TokenPair::new("access-acc-1", "refresh-acc-1"))
    }

    #[tokio::test]
    async fn matching_role_signs_in() {
        let (login, provider) = orchestrator(citizen_provider(), fallback_tokens());

        let outcome = login.login("a@x.com", "secret", &Role::Citizen).await;

        let account = outcome.success().expect("login succeeds");
        assert_eq!(account.id.as_str(), "acc-1");
        assert!(provider.current_session().is_some());
        assert_eq!(login.fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejection_is_final_and_skips_fallback() {
        let (login, provider) = orchestrator(citizen_provider(), fallback_tokens());

        let outcome = login.login("a@x.com", "wrong", &Role::Citizen).await;

        assert_eq!(outcome.error(), Some("Invalid login credentials"));
        assert_eq!(provider.sign_in_calls.load(Ordering::SeqCst), 1);
        assert_eq!(login.fallback.calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.set_session_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn role_mismatch_signs_out_and_names_roles() {
        let (login, provider) = orchestrator(citizen_provider(), fallback_tokens());

        let outcome = login.login("a@x.com", "secret", &Role::Admin).await;

        let message = outcome.error().expect("login fails");
        assert!(message.contains("admin"), "{message}");
        assert!(message.contains("citizen"), "{message}");
        assert_eq!(provider.sign_out_calls.load(Ordering::SeqCst), 1);
        assert!(provider.get_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn undeclared_role_passes_any_expectation() {
        let provider = FakeProvider::new().with_user("secret", account("acc-9", "b@x.com", None));
        let (login, provider) = orchestrator(provider, fallback_tokens());

        let outcome = login.login("b@x.com", "secret", &Role::Admin).await;

        assert!(outcome.is_success());
        assert_eq!(provider.sign_out_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_primary_falls_back_once_after_deadline() {
        let provider = citizen_provider();
        provider.set_sign_in_mode(SignInMode::Hang);
        let (login, provider) = orchestrator(provider, fallback_tokens());

        let started = Instant::now();
        let outcome = login.login("a@x.com", "secret", &Role::Citizen).await;

        assert!(outcome.is_success(), "{:?}", outcome.error());
        assert!(started.elapsed() >= PRIMARY_SIGN_IN_TIMEOUT);
        assert_eq!(login.fallback.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.set_session_calls.load(Ordering::SeqCst), 1);
        assert!(provider.current_session().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_error_is_returned() {
        let provider = citizen_provider();
        provider.set_sign_in_mode(SignInMode::Hang);
        let grant = FakeGrant::failing(AuthenticationError::TokenEndpoint {
            status: 400,
            message: "Invalid login credentials".to_string(),
        });
        let (login, provider) = orchestrator(provider, grant);

        let outcome = login.login("a@x.com", "secret", &Role::Citizen).await;

        assert_eq!(outcome.error(), Some("Invalid login credentials"));
        assert_eq!(login.fallback.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.set_session_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_session_install_is_returned() {
        let provider = citizen_provider();
        provider.set_sign_in_mode(SignInMode::Hang);
        provider.fail_set_session.store(true, Ordering::SeqCst);
        let (login, _provider) = orchestrator(provider, fallback_tokens());

        let outcome = login.login("a@x.com", "secret", &Role::Citizen).await;

        assert_eq!(
            outcome.error(),
            Some("failed to install session: refresh token revoked")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_session_is_role_checked() {
        let provider = citizen_provider();
        provider.set_sign_in_mode(SignInMode::Hang);
        let (login, provider) = orchestrator(provider, fallback_tokens());

        let outcome = login.login("a@x.com", "secret", &Role::Admin).await;

        assert!(outcome.error().unwrap().contains("admin"));
        assert!(provider.current_session().is_none());
    }

    #[tokio::test]
    async fn login_populates_manager_state_through_notification() {
        let provider = Arc::new(citizen_provider());
        let manager =
            SessionManager::initialize(Arc::clone(&provider), Arc::new(FakeProfiles::new())).await;
        let login = manager.orchestrator(fallback_tokens());
        let mut reader = manager.reader();

        let outcome = login.login("a@x.com", "secret", &Role::Citizen).await;
        assert!(outcome.is_success());

        let state = tokio::time::timeout(
            Duration::from_secs(1),
            reader.wait_until(|s| s.is_authenticated()),
        )
        .await
        .expect("notification applied")
        .expect("writer alive");
        let user = state.current_user().unwrap();
        assert_eq!(user.role(), &Role::Citizen);
        assert_eq!(user.name(), "a");
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn profile_fetch_failure_does_not_fail_login() {
        let provider = Arc::new(citizen_provider());
        let profiles = FakeProfiles::new();
        profiles.fail_fetch.store(true, Ordering::SeqCst);
        let manager = SessionManager::initialize(Arc::clone(&provider), Arc::new(profiles)).await;
        let login = manager.orchestrator(fallback_tokens());
        let mut reader = manager.reader();

        assert!(login.login("a@x.com", "secret", &Role::Citizen).await.is_success());

        let state = tokio::time::timeout(
            Duration::from_secs(1),
            reader.wait_until(|s| s.is_authenticated()),
        )
        .await
        .expect("notification applied")
        .expect("writer alive");
        let user = state.current_user().unwrap();
        assert!(!user.is_profile_backed());
        assert_eq!(user.role(), &Role::Citizen);
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: "secret".to_string(),
            full_name: "Ravi Kumar".to_string(),
            phone: Some("+91 90000 22222".to_string()),
            role: Role::Admin,
            department: Some("Sanitation".to_string()),
        }
    }

    #[tokio::test]
    async fn register_creates_account_and_profile() {
        let provider = Arc::new(FakeProvider::new());
        let profiles = Arc::new(FakeProfiles::new());
        let login = LoginOrchestrator::new(provider, Arc::clone(&profiles), fallback_tokens());

        let account = login
            .register(&registration("ravi@x.in"))
            .await
            .success()
            .expect("registered");

        assert_eq!(account.user_metadata.role.as_deref(), Some("admin"));
        assert_eq!(account.user_metadata.full_name.as_deref(), Some("Ravi Kumar"));
        let row = profiles.row(&account.id).expect("profile row");
        assert_eq!(row.role, Some(Role::Admin));
        assert_eq!(row.department.as_deref(), Some("Sanitation"));
    }

    #[tokio::test]
    async fn register_survives_profile_write_failure() {
        let profiles = FakeProfiles::new();
        profiles.fail_upsert.store(true, Ordering::SeqCst);
        let profiles = Arc::new(profiles);
        let login = LoginOrchestrator::new(
            Arc::new(FakeProvider::new()),
            Arc::clone(&profiles),
            fallback_tokens(),
        );

        let outcome = login.register(&registration("ravi@x.in")).await;

        assert!(outcome.is_success());
        assert!(profiles.row(&AccountId::from("acc-ravi@x.in")).is_none());
    }

    #[tokio::test]
    async fn register_reports_duplicate_account() {
        let (login, _provider) = orchestrator(citizen_provider(), fallback_tokens());

        let outcome = login.register(&registration("a@x.com")).await;

        assert_eq!(outcome.error(), Some("User already registered"));
    }

    #[tokio::test]
    async fn logout_clears_state_after_revoke() {
        let provider = Arc::new(
            FakeProvider::new().with_session(account("acc-1", "a@x.com", Some("citizen"))),
        );
        let manager =
            SessionManager::initialize(Arc::clone(&provider), Arc::new(FakeProfiles::new())).await;
        let login = manager.orchestrator(fallback_tokens());
        assert!(manager.snapshot().is_authenticated());

        assert_eq!(login.logout().await, AuthOutcome::Success(()));

        assert!(!manager.snapshot().is_authenticated());
        assert!(provider.current_session().is_none());
    }

    #[tokio::test]
    async fn failed_revoke_keeps_user() {
        let provider = Arc::new(
            FakeProvider::new().with_session(account("acc-1", "a@x.com", Some("citizen"))),
        );
        provider.fail_sign_out.store(true, Ordering::SeqCst);
        let manager =
            SessionManager::initialize(Arc::clone(&provider), Arc::new(FakeProfiles::new())).await;
        let login = manager.orchestrator(fallback_tokens());

        let outcome = login.logout().await;

        assert_eq!(outcome.error(), Some("failed to sign out: network down"));
        assert!(manager.current_user().is_some_and(|u: CurrentUser| u.id().as_str() == "acc-1"));
    }

    #[tokio::test]
    async fn verify_otp_stamps_requested_role() {
        let (login, provider) = orchestrator(FakeProvider::new(), fallback_tokens());

        let account = login
            .verify_otp("+919000011111", "123456", &Role::Citizen)
            .await
            .success()
            .expect("verified");

        assert_eq!(account.declared_role(), Some(Role::Citizen));
        assert_eq!(provider.update_user_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn verify_otp_rejects_bad_code() {
        let (login, provider) = orchestrator(FakeProvider::new(), fallback_tokens());

        let outcome = login.verify_otp("+919000011111", "000000", &Role::Citizen).await;

        assert_eq!(outcome.error(), Some("Token has expired or is invalid"));
        assert_eq!(provider.update_user_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn update_password_requires_session_and_length() {
        let (login, provider) = orchestrator(citizen_provider(), fallback_tokens());

        let short = login.update_password("abc").await;
        assert_eq!(short.error(), Some("Password must be at least 6 characters"));

        let signed_out = login.update_password("new-secret").await;
        assert_eq!(signed_out.error(), Some("no active session"));
        assert_eq!(provider.update_user_calls.load(Ordering::SeqCst), 0);

        assert!(login.login("a@x.com", "secret", &Role::Citizen).await.is_success());
        assert!(login.update_password("new-secret").await.is_success());
        assert_eq!(provider.update_user_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn otp_and_reset_requests_pass_through() {
        let (login, _provider) = orchestrator(FakeProvider::new(), fallback_tokens());

        assert!(login.request_otp("+919000011111").await.is_success());
        assert!(
            login
                .request_password_reset("a@x.com", Some("https://app.local/reset"))
                .await
                .is_success()
        );
    }

    #[test]
    fn oauth_url_requires_provider_name() {
        let (login, _provider) = orchestrator(FakeProvider::new(), fallback_tokens());

        assert_eq!(
            login.oauth_url("google", None),
            AuthOutcome::Success("https://fake.local/authorize?provider=google".to_string())
        );
        assert!(!login.oauth_url("  ", None).is_success());
    }
}
