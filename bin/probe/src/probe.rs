//! Connection check and debug login.

use crate::config::ProbeConfig;
use rootcause::prelude::Report;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use urbansetu_platform_access::{CurrentUser, IdentityProvider, ProfileStore, SessionManager};
use urbansetu_supabase::{ProfileTable, RestClient, RestError, SupabaseAuth};

/// How long to wait for the session notification after a login.
const USER_WAIT: Duration = Duration::from_secs(10);

/// How long to wait for the profile row after the user appears.
const PROFILE_WAIT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The provider client could not be built.
    Setup { reason: String },
    /// The provider could not be reached.
    Unreachable { reason: String },
    /// The debug login failed.
    Login { reason: String },
    /// The debug login succeeded but no user state followed.
    NoUserState,
    /// Sign-out after the debug login failed.
    Logout { reason: String },
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup { reason } => write!(f, "could not set up provider client: {reason}"),
            Self::Unreachable { reason } => write!(f, "provider unreachable: {reason}"),
            Self::Login { reason } => write!(f, "login failed: {reason}"),
            Self::NoUserState => write!(f, "login succeeded but no user state arrived"),
            Self::Logout { reason } => write!(f, "logout failed: {reason}"),
        }
    }
}

impl std::error::Error for ProbeError {}

/// Runs the connection check and, if credentials are configured, the
/// debug login.
pub async fn run(config: ProbeConfig) -> Result<(), Report<ProbeError>> {
    let auth = Arc::new(
        SupabaseAuth::new(config.supabase.clone()).map_err(|report| ProbeError::Setup {
            reason: report.current_context().to_string(),
        })?,
    );
    let rest = RestClient::with_auth(Arc::clone(&auth));

    check_connection(&auth, &rest).await?;

    let Some((email, password)) = config.probe.credentials() else {
        info!("no probe credentials configured; skipping login");
        return Ok(());
    };

    let profiles = Arc::new(ProfileTable::new(rest));
    let mut manager = SessionManager::initialize(Arc::clone(&auth), profiles).await;
    let orchestrator = manager.orchestrator(auth.token_endpoint());

    let outcome = orchestrator
        .login(email, password, &config.probe.role)
        .await;
    if let Some(reason) = outcome.error() {
        manager.teardown();
        return Err(ProbeError::Login {
            reason: reason.to_string(),
        }
        .into());
    }

    let user = wait_for_user(&manager).await;
    let result = match user {
        Some(user) => {
            print_user(&user);
            Ok(())
        }
        None => Err(ProbeError::NoUserState),
    };

    let logout = orchestrator.logout().await;
    manager.teardown();
    if let Some(reason) = logout.error() {
        return Err(ProbeError::Logout {
            reason: reason.to_string(),
        }
        .into());
    }
    info!("signed out");
    result?;
    Ok(())
}

async fn check_connection(
    auth: &SupabaseAuth,
    rest: &RestClient,
) -> Result<(), Report<ProbeError>> {
    match auth.get_session().await {
        Ok(Some(session)) => info!(account_id = %session.account().id, "existing session found"),
        Ok(None) => info!("no existing session"),
        Err(report) => warn!(error = %report, "session read failed"),
    }

    let limit = [("limit", "1".to_string())];
    match rest.select::<JsonValue>("profiles", &limit).await {
        Ok(rows) => {
            info!(rows = rows.len(), "row store reachable");
            Ok(())
        }
        Err(report) => match report.current_context() {
            RestError::Status { status, message } => {
                warn!(status, %message, "row store reachable but refused the read");
                Ok(())
            }
            other => Err(ProbeError::Unreachable {
                reason: other.to_string(),
            }
            .into()),
        },
    }
}

async fn wait_for_user<P, S>(manager: &SessionManager<P, S>) -> Option<CurrentUser>
where
    P: IdentityProvider + 'static,
    S: ProfileStore + 'static,
{
    let mut reader = manager.reader();
    let signed_in = tokio::time::timeout(
        USER_WAIT,
        reader.wait_until(|state| state.current_user().is_some()),
    )
    .await
    .ok()
    .flatten()?;

    let backed = tokio::time::timeout(
        PROFILE_WAIT,
        reader.wait_until(|state| {
            state
                .current_user()
                .is_some_and(CurrentUser::is_profile_backed)
        }),
    )
    .await
    .ok()
    .flatten();

    match backed {
        Some(state) => state.current_user().cloned(),
        None => {
            warn!("no profile row arrived; showing account metadata");
            signed_in.current_user().cloned()
        }
    }
}

fn print_user(user: &CurrentUser) {
    println!("id:          {}", user.id());
    println!("name:        {}", user.name());
    println!("role:        {}", user.role());
    println!("phone:       {}", user.phone());
    println!("department:  {}", user.department().unwrap_or("-"));
    println!("email:       {}", user.email().unwrap_or("-"));
    println!("profile row: {}", user.is_profile_backed());
}
