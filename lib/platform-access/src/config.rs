//! Identity/storage provider configuration.
//!
//! The hosted provider is reached through one base URL and a public API
//! key. Both are required; the HTTP binding refuses to call out without
//! them.

use crate::error::AuthenticationError;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the hosted identity/storage provider.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Project base URL (e.g., "https://abcd.supabase.co").
    #[serde(default)]
    url: String,
    /// Public (anon) API key sent as the `apikey` header.
    #[serde(default)]
    anon_key: String,
    /// Per-request timeout for provider calls, in seconds.
    /// Default: none; calls wait for the provider.
    #[serde(default)]
    request_timeout_secs: Option<u64>,
    /// Where password-reset and third-party sign-in flows return to.
    #[serde(default)]
    redirect_to: Option<String>,
}

impl ProviderConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            request_timeout_secs: None,
            redirect_to: None,
        }
    }

    /// Creates a configuration builder for more customization.
    #[must_use]
    pub fn builder(url: impl Into<String>, anon_key: impl Into<String>) -> ProviderConfigBuilder {
        ProviderConfigBuilder {
            config: Self::new(url, anon_key),
        }
    }

    /// Returns the base URL without a trailing slash.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    #[must_use]
    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Per-request timeout, if one is configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn redirect_to(&self) -> Option<&str> {
        self.redirect_to.as_deref()
    }

    /// Returns `{url}/auth/v1/{path}`.
    #[must_use]
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url(), path.trim_start_matches('/'))
    }

    /// Returns `{url}/rest/v1/{table}`.
    #[must_use]
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url(), table.trim_start_matches('/'))
    }

    /// Checks that the required values are present.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationError::Configuration` naming the first missing
    /// value.
    pub fn validate(&self) -> Result<(), Report<AuthenticationError>> {
        if self.url().trim().is_empty() {
            return Err(AuthenticationError::Configuration {
                missing: "provider url".to_string(),
            }
            .into());
        }
        if self.anon_key.trim().is_empty() {
            return Err(AuthenticationError::Configuration {
                missing: "provider anon key".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Builder for `ProviderConfig`.
#[derive(Debug)]
pub struct ProviderConfigBuilder {
    config: ProviderConfig,
}

impl ProviderConfigBuilder {
    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// Sets the redirect target for reset and third-party sign-in flows.
    #[must_use]
    pub fn redirect_to(mut self, redirect_to: impl Into<String>) -> Self {
        self.config.redirect_to = Some(redirect_to.into());
        self
    }

    #[must_use]
    pub fn build(self) -> ProviderConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_has_defaults() {
        let config = ProviderConfig::new("https://abcd.supabase.co/", "anon");

        assert_eq!(config.url(), "https://abcd.supabase.co");
        assert_eq!(config.anon_key(), "anon");
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.redirect_to(), None);
    }

    #[test]
    fn endpoint_urls_join_cleanly() {
        let config = ProviderConfig::new("https://abcd.supabase.co/", "anon");

        assert_eq!(
            config.auth_url("token?grant_type=password"),
            "https://abcd.supabase.co/auth/v1/token?grant_type=password"
        );
        assert_eq!(
            config.rest_url("/profiles"),
            "https://abcd.supabase.co/rest/v1/profiles"
        );
    }

    #[test]
    fn builder_allows_customization() {
        let config = ProviderConfig::builder("https://abcd.supabase.co", "anon")
            .request_timeout(Duration::from_secs(5))
            .redirect_to("https://app.local/reset-password")
            .build();

        assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.redirect_to(), Some("https://app.local/reset-password"));
    }

    #[test]
    fn validate_names_missing_value() {
        let err = ProviderConfig::new("", "anon").validate().unwrap_err();
        assert_eq!(
            err.current_context(),
            &AuthenticationError::Configuration {
                missing: "provider url".to_string()
            }
        );

        let err = ProviderConfig::new("https://abcd.supabase.co", " ")
            .validate()
            .unwrap_err();
        assert!(err.current_context().to_string().contains("anon key"));

        assert!(ProviderConfig::new("https://abcd.supabase.co", "anon").validate().is_ok());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let json = r#"{
            "url": "https://abcd.supabase.co",
            "anon_key": "anon"
        }"#;

        let config: ProviderConfig = serde_json::from_str(json).expect("deserialize");

        assert_eq!(config.url(), "https://abcd.supabase.co");
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn config_reads_explicit_timeout() {
        let json = r#"{
            "url": "https://abcd.supabase.co",
            "anon_key": "anon",
            "request_timeout_secs": 12
        }"#;

        let config: ProviderConfig = serde_json::from_str(json).expect("deserialize");

        assert_eq!(config.request_timeout(), Some(Duration::from_secs(12)));
    }
}
