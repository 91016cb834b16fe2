//! Probe configuration, loaded from environment variables.
//!
//! ```text
//! SUPABASE__URL=https://abcd.supabase.co
//! SUPABASE__ANON_KEY=...
//! PROBE__EMAIL=asha@example.in      # optional
//! PROBE__PASSWORD=...               # optional
//! PROBE__ROLE=admin                 # optional, default citizen
//! ```

use serde::Deserialize;
use urbansetu_platform_access::{ProviderConfig, Role};

/// Probe configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ProbeConfig {
    /// Hosted provider connection.
    pub supabase: ProviderConfig,

    /// Debug login; skipped unless both email and password are set.
    #[serde(default)]
    pub probe: LoginConfig,
}

/// Credentials for the debug login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginConfig {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Role the account must hold.
    #[serde(default)]
    pub role: Role,
}

impl LoginConfig {
    /// Email and password, if both are set and non-blank.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let email = self.email.as_deref().filter(|e| !e.trim().is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some((email, password))
    }
}

impl ProbeConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(config::Environment::default())
    }

    fn load(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
