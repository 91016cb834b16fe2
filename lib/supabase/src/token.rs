//! Direct password grant against `/auth/v1/token`.
//!
//! Used only when the primary sign-in stalls. It returns the raw token pair
//! and leaves installing it as a session to the caller.

use crate::wire::{ApiErrorBody, reason_phrase, transport};
use async_trait::async_trait;
use reqwest::Client;
use rootcause::prelude::Report;
use tracing::{debug, instrument, warn};
use urbansetu_platform_access::{
    AuthenticationError, Credentials, PasswordGrant, ProviderConfig, TokenPair,
};

/// Password grant over a bare HTTP call.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    http: Client,
    config: ProviderConfig,
}

impl TokenEndpoint {
    /// Creates an endpoint with its own HTTP client.
    ///
    /// The configuration is checked on each call, not here.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self, Report<AuthenticationError>> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(transport)?;
        Ok(Self::with_client(http, config))
    }

    pub(crate) fn with_client(http: Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl PasswordGrant for TokenEndpoint {
    #[instrument(skip_all, fields(email = %credentials.email))]
    async fn password_grant(
        &self,
        credentials: &Credentials,
    ) -> Result<TokenPair, Report<AuthenticationError>> {
        self.config.validate()?;

        let response = self
            .http
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", self.config.anon_key())
            .json(credentials)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = ApiErrorBody::read(response).await;
            let message = body
                .error_description
                .or(body.msg)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| reason_phrase(status));
            warn!(status = status.as_u16(), "token endpoint refused password grant");
            return Err(AuthenticationError::TokenEndpoint {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let tokens: TokenPair =
            response
                .json()
                .await
                .map_err(|e| AuthenticationError::InvalidResponse {
                    reason: e.to_string(),
                })?;
        debug!("token endpoint issued tokens");
        Ok(tokens)
    }
}
