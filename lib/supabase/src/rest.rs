//! `/rest/v1` row access.
//!
//! Requests carry the signed-in user's access token when there is one, so
//! row-level security applies to that user; otherwise the anon key.

use crate::auth::SupabaseAuth;
use crate::error::RestError;
use crate::wire::{ApiErrorBody, reason_phrase};
use reqwest::{Client, Method, RequestBuilder, Response};
use rootcause::prelude::Report;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;
use urbansetu_platform_access::ProviderConfig;

/// Builds an equality filter value (`eq.<value>`).
#[must_use]
pub fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Client for the row endpoints.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    config: ProviderConfig,
    auth: Option<Arc<SupabaseAuth>>,
}

impl RestClient {
    /// Creates an anonymous client.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the HTTP client cannot be built.
    pub fn new(config: ProviderConfig) -> Result<Self, Report<RestError>> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| RestError::Transport {
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            config,
            auth: None,
        })
    }

    /// Creates a client that acts as the auth client's signed-in user.
    #[must_use]
    pub fn with_auth(auth: Arc<SupabaseAuth>) -> Self {
        Self {
            http: auth.http().clone(),
            config: auth.config().clone(),
            auth: Some(auth),
        }
    }

    async fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let bearer = match &self.auth {
            Some(auth) => auth.access_token().await,
            None => None,
        }
        .unwrap_or_else(|| self.config.anon_key().to_string());

        self.http
            .request(method, self.config.rest_url(table))
            .header("apikey", self.config.anon_key())
            .bearer_auth(bearer)
    }

    async fn send(request: RequestBuilder) -> Result<Response, Report<RestError>> {
        let response = request.send().await.map_err(|e| RestError::Transport {
            reason: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = ApiErrorBody::read(response).await;
            let message = body
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| reason_phrase(status));
            return Err(RestError::Status {
                status: status.as_u16(),
                message,
            }
            .into());
        }
        Ok(response)
    }

    async fn rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>, Report<RestError>> {
        let rows = response
            .json::<Vec<T>>()
            .await
            .map_err(|e| RestError::InvalidResponse {
                reason: e.to_string(),
            })?;
        Ok(rows)
    }

    /// Reads all rows of `table` matching `filters`.
    ///
    /// # Errors
    ///
    /// Returns the transport, status, or decoding error.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>, Report<RestError>> {
        let request = self
            .request(Method::GET, table)
            .await
            .query(&[("select", "*")])
            .query(filters);
        let rows = Self::rows(Self::send(request).await?).await?;
        debug!(table, count = rows.len(), "selected rows");
        Ok(rows)
    }

    /// Inserts a row, merging into an existing row with the same key.
    ///
    /// # Errors
    ///
    /// Returns the transport or status error.
    pub async fn upsert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<(), Report<RestError>> {
        let request = self
            .request(Method::POST, table)
            .await
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row);
        Self::send(request).await?;
        debug!(table, "upserted row");
        Ok(())
    }

    /// Patches the rows matching `filters`. Returns how many rows changed.
    ///
    /// # Errors
    ///
    /// Returns the transport, status, or decoding error.
    pub async fn update<T: Serialize + ?Sized>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        patch: &T,
    ) -> Result<usize, Report<RestError>> {
        let request = self
            .request(Method::PATCH, table)
            .await
            .query(filters)
            .header("Prefer", "return=representation")
            .json(patch);
        let rows: Vec<JsonValue> = Self::rows(Self::send(request).await?).await?;
        debug!(table, count = rows.len(), "updated rows");
        Ok(rows.len())
    }
}
