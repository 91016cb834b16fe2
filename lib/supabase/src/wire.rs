//! Wire shapes shared by the auth and row endpoints.

use chrono::{DateTime, Duration, Utc};
use reqwest::{Response, StatusCode};
use rootcause::prelude::Report;
use serde::Deserialize;
use urbansetu_platform_access::{
    Account, AuthenticationError, Session, TokenPair, access_token_expiry,
};

/// Error body returned by the auth and row endpoints.
///
/// Different endpoints use different keys for the human-readable message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiErrorBody {
    /// Parses an error body. Anything that is not a JSON object yields an
    /// empty body.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_default()
    }

    /// Consumes a response and parses its body.
    pub async fn read(response: Response) -> Self {
        match response.text().await {
            Ok(text) => Self::parse(&text),
            Err(_) => Self::default(),
        }
    }

    /// The most specific message present.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        [
            &self.error_description,
            &self.msg,
            &self.message,
            &self.error,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|m| !m.trim().is_empty())
    }
}

/// Standard reason phrase for a status, for bodies that carry no message.
pub(crate) fn reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

/// Converts a non-success auth response into an error.
///
/// Client errors are definitive rejections; server errors count as the
/// provider being unavailable.
pub(crate) async fn auth_rejection(response: Response) -> AuthenticationError {
    let status = response.status();
    let body = ApiErrorBody::read(response).await;
    let reason = body
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| reason_phrase(status));
    if status.is_server_error() {
        AuthenticationError::Transport { reason }
    } else {
        AuthenticationError::Rejected { reason }
    }
}

pub(crate) fn transport(error: reqwest::Error) -> AuthenticationError {
    AuthenticationError::Transport {
        reason: error.to_string(),
    }
}

/// Body of a successful token grant, refresh, or OTP verification.
#[derive(Debug, Deserialize)]
pub(crate) struct SessionResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<Account>,
}

impl SessionResponse {
    /// Builds a session. A grant that names no account is refused.
    pub(crate) fn into_session(self) -> Result<Session, Report<AuthenticationError>> {
        let expires_at = self
            .expires_at
            .and_then(|at| DateTime::from_timestamp(at, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)))
            .or_else(|| access_token_expiry(&self.access_token));
        let account = self.user.ok_or(AuthenticationError::NoAccount)?;
        let tokens = TokenPair::new(self.access_token, self.refresh_token);
        Ok(Session::new(tokens, expires_at, account))
    }
}

/// Sign-up answers with a session when confirmation is off, else with the
/// bare account.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SignUpResponse {
    Session(SessionResponse),
    Account(Account),
}
