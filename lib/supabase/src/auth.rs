//! `/auth/v1` client.
//!
//! Holds the active session in memory and pushes a `SessionChange` to every
//! subscriber whenever it is installed, refreshed, updated, or cleared.

use crate::token::TokenEndpoint;
use crate::wire::{SessionResponse, SignUpResponse, auth_rejection, transport};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, instrument, warn};
use urbansetu_platform_access::{
    Account, AuthenticationError, Credentials, IdentityProvider, ProviderConfig, Session,
    SessionChange, SessionChanges, SessionEvent, SignUp, TokenPair, UserAttributes,
    access_token_expiry,
};

/// Buffered notifications per subscriber before it starts lagging.
const CHANGE_CAPACITY: usize = 16;

/// Identity provider client over HTTP.
pub struct SupabaseAuth {
    http: Client,
    config: ProviderConfig,
    session: RwLock<Option<Session>>,
    /// Held for the whole refresh exchange; refresh tokens are single-use.
    refreshing: Mutex<()>,
    changes: broadcast::Sender<SessionChange>,
}

impl SupabaseAuth {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationError::Configuration` if the URL or key is
    /// missing, or `Transport` if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self, Report<AuthenticationError>> {
        config.validate()?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(transport)?;
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Ok(Self {
            http,
            config,
            session: RwLock::new(None),
            refreshing: Mutex::new(()),
            changes,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// A token-endpoint fallback sharing this client's connection pool.
    #[must_use]
    pub fn token_endpoint(&self) -> TokenEndpoint {
        TokenEndpoint::with_client(self.http.clone(), self.config.clone())
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    /// Access token of the live session, refreshing it first if needed.
    pub async fn access_token(&self) -> Option<String> {
        match self.get_session().await {
            Ok(session) => session.map(|s| s.access_token().to_string()),
            Err(report) => {
                warn!(error = %report, "could not read session for access token");
                None
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.config.auth_url(path))
            .header("apikey", self.config.anon_key())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, Report<AuthenticationError>> {
        let response = request.send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(auth_rejection(response).await.into());
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, Report<AuthenticationError>> {
        let response = self.send(request).await?;
        let body = response
            .json::<T>()
            .await
            .map_err(|e| AuthenticationError::InvalidResponse {
                reason: e.to_string(),
            })?;
        Ok(body)
    }

    fn notify(&self, event: SessionEvent, session: Option<Session>) {
        // No subscribers is fine.
        let _ = self.changes.send(SessionChange::new(event, session));
    }

    async fn install(&self, event: SessionEvent, session: Session) -> Session {
        *self.session.write().await = Some(session.clone());
        debug!(%event, account_id = %session.account().id, "session stored");
        self.notify(event, Some(session.clone()));
        session
    }

    async fn clear(&self) {
        let previous = self.session.write().await.take();
        if previous.is_some() {
            self.notify(SessionEvent::SignedOut, None);
        }
    }

    /// Drops the stored session only if it still carries `refresh_token`.
    async fn clear_if_current(&self, refresh_token: &str) {
        let mut stored = self.session.write().await;
        if stored
            .as_ref()
            .is_some_and(|session| session.refresh_token() == refresh_token)
        {
            *stored = None;
            drop(stored);
            self.notify(SessionEvent::SignedOut, None);
        }
    }

    async fn current(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, Report<AuthenticationError>> {
        let request = self
            .request(Method::POST, "token")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        let response: SessionResponse = self.send_json(request).await?;
        response.into_session()
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Account, Report<AuthenticationError>> {
        let request = self.request(Method::GET, "user").bearer_auth(access_token);
        self.send_json(request).await
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn get_session(&self) -> Result<Option<Session>, Report<AuthenticationError>> {
        let Some(session) = self.current().await else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        let _refreshing = self.refreshing.lock().await;
        // Another caller may have refreshed or cleared it while this one waited.
        let Some(session) = self.current().await else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        debug!(account_id = %session.account().id, "session expired; refreshing");
        match self.refresh(session.refresh_token()).await {
            Ok(fresh) => Ok(Some(self.install(SessionEvent::TokenRefreshed, fresh).await)),
            Err(report) => {
                warn!(error = %report, "session refresh failed; signing out locally");
                self.clear_if_current(session.refresh_token()).await;
                Ok(self.current().await)
            }
        }
    }

    fn subscribe(&self) -> SessionChanges {
        SessionChanges::new(self.changes.subscribe())
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<Session, Report<AuthenticationError>> {
        let request = self
            .request(Method::POST, "token")
            .query(&[("grant_type", "password")])
            .json(credentials);
        let response: SessionResponse = self.send_json(request).await?;
        let session = response.into_session()?;
        Ok(self.install(SessionEvent::SignedIn, session).await)
    }

    #[instrument(skip_all)]
    async fn set_session(
        &self,
        tokens: &TokenPair,
    ) -> Result<Session, Report<AuthenticationError>> {
        let expires_at = access_token_expiry(&tokens.access_token);
        let resolved = if expires_at.is_some_and(|at| at <= Utc::now()) {
            self.refresh(&tokens.refresh_token).await
        } else {
            self.fetch_user(&tokens.access_token)
                .await
                .map(|account| Session::from_tokens(tokens.clone(), account))
        };
        let session = resolved.map_err(|report| AuthenticationError::SessionInstall {
            reason: report.current_context().to_string(),
        })?;
        Ok(self.install(SessionEvent::SignedIn, session).await)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), Report<AuthenticationError>> {
        let Some(session) = self.current().await else {
            return Ok(());
        };

        let response = self
            .request(Method::POST, "logout")
            .bearer_auth(session.access_token())
            .send()
            .await
            .map_err(|e| AuthenticationError::SignOut {
                reason: e.to_string(),
            })?;

        let status = response.status();
        // The provider no longer knows the session; there is nothing left to revoke.
        let already_gone = matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        );
        if !status.is_success() && !already_gone {
            let reason = auth_rejection(response).await.to_string();
            return Err(AuthenticationError::SignOut { reason }.into());
        }

        self.clear().await;
        info!(account_id = %session.account().id, "session revoked");
        Ok(())
    }

    #[instrument(skip_all, fields(email = %request.email))]
    async fn sign_up(&self, request: &SignUp) -> Result<Account, Report<AuthenticationError>> {
        let http_request = self.request(Method::POST, "signup").json(request);
        match self.send_json::<SignUpResponse>(http_request).await? {
            SignUpResponse::Session(response) => {
                let session = response.into_session()?;
                let account = session.account().clone();
                self.install(SessionEvent::SignedIn, session).await;
                Ok(account)
            }
            SignUpResponse::Account(account) => {
                debug!(account_id = %account.id, "sign-up awaiting confirmation");
                Ok(account)
            }
        }
    }

    #[instrument(skip_all)]
    async fn update_user(
        &self,
        attributes: &UserAttributes,
    ) -> Result<Account, Report<AuthenticationError>> {
        let Some(mut session) = self.get_session().await? else {
            return Err(AuthenticationError::NotSignedIn.into());
        };
        let request = self
            .request(Method::PUT, "user")
            .bearer_auth(session.access_token())
            .json(attributes);
        let account: Account = self.send_json(request).await?;
        session.set_account(account.clone());
        self.install(SessionEvent::UserUpdated, session).await;
        Ok(account)
    }

    #[instrument(skip(self))]
    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), Report<AuthenticationError>> {
        let mut request = self
            .request(Method::POST, "recover")
            .json(&json!({ "email": email }));
        if let Some(redirect_to) = redirect_to.or(self.config.redirect_to()) {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn sign_in_with_otp(&self, phone: &str) -> Result<(), Report<AuthenticationError>> {
        let request = self
            .request(Method::POST, "otp")
            .json(&json!({ "phone": phone }));
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn verify_otp(
        &self,
        phone: &str,
        token: &str,
    ) -> Result<Session, Report<AuthenticationError>> {
        let request = self
            .request(Method::POST, "verify")
            .json(&json!({ "type": "sms", "phone": phone, "token": token }));
        let response: SessionResponse = self.send_json(request).await?;
        let session = response.into_session()?;
        Ok(self.install(SessionEvent::SignedIn, session).await)
    }

    fn authorize_url(&self, provider: &str, redirect_to: Option<&str>) -> String {
        let base = self.config.auth_url("authorize");
        let mut params = vec![("provider", provider)];
        if let Some(redirect_to) = redirect_to.or(self.config.redirect_to()) {
            params.push(("redirect_to", redirect_to));
        }
        match Url::parse_with_params(&base, &params) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!(error = %e, "could not build authorize url");
                base
            }
        }
    }
}
