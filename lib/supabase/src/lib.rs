//! HTTP binding to the hosted identity provider and row store.
//!
//! - [`SupabaseAuth`]: the `/auth/v1` client; implements `IdentityProvider`
//! - [`TokenEndpoint`]: the bare password grant used when sign-in stalls
//! - [`RestClient`]: `/rest/v1` row access as the signed-in user
//! - [`ProfileTable`], [`ComplaintTable`]: the storage seams over `RestClient`
//!
//! ```no_run
//! use std::sync::Arc;
//! use urbansetu_platform_access::{ProviderConfig, Role, SessionManager};
//! use urbansetu_supabase::{ProfileTable, RestClient, SupabaseAuth};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProviderConfig::new("https://abcd.supabase.co", "anon-key");
//! let auth = Arc::new(SupabaseAuth::new(config).map_err(|r| r.to_string())?);
//! let profiles = Arc::new(ProfileTable::new(RestClient::with_auth(Arc::clone(&auth))));
//! let manager = SessionManager::initialize(Arc::clone(&auth), profiles).await;
//! let outcome = manager
//!     .orchestrator(auth.token_endpoint())
//!     .login("asha@example.in", "secret", &Role::Citizen)
//!     .await;
//! println!("signed in: {}", outcome.is_success());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod rest;
pub mod tables;
pub mod token;
pub mod wire;

pub use auth::SupabaseAuth;
pub use error::RestError;
pub use rest::{RestClient, eq};
pub use tables::{ComplaintTable, ProfileTable};
pub use token::TokenEndpoint;
pub use wire::ApiErrorBody;
