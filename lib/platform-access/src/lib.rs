//! Session lifecycle and login orchestration for urbansetu.
//!
//! This crate provides:
//! - Identity types (`Account`, `Profile`, `Session`, `Role`)
//! - The provider and storage seams (`IdentityProvider`, `PasswordGrant`,
//!   `ProfileStore`)
//! - The process-wide user state (`UserState`, `CurrentUser`) and its
//!   single writer, `SessionManager`
//! - `LoginOrchestrator`: deadline-raced sign-in with a token-endpoint
//!   fallback and a role check
//!
//! # State model
//!
//! `SessionManager` owns the user state. Views hold a `UserStateReader`
//! and never write. The state changes when the provider pushes a session
//! notification, when a background profile fetch completes, and when a
//! logout is confirmed.
//!
//! # Example
//!
//! ```
//! use urbansetu_platform_access::{Account, CurrentUser, Profile, Role, UserMetadata};
//!
//! let mut account = Account::new("8d0c", Some("asha@example.in".to_string()));
//! account.user_metadata = UserMetadata::with_role(&Role::Citizen);
//!
//! // Before the profile row arrives the name comes from the email.
//! let user = CurrentUser::from_account(account.clone());
//! assert_eq!(user.name(), "asha");
//!
//! // The profile row wins for name and role.
//! let mut profile = Profile::new(account.id.clone());
//! profile.full_name = Some("Asha Rao".to_string());
//! profile.role = Some(Role::Admin);
//! let user = CurrentUser::with_profile(account, profile);
//! assert_eq!(user.name(), "Asha Rao");
//! assert!(user.role().is_admin());
//! ```

pub mod account;
pub mod config;
pub mod error;
pub mod login;
pub mod manager;
pub mod profile;
pub mod provider;
pub mod race;
pub mod role;
pub mod session;
pub mod state;

#[cfg(test)]
mod test_support;

// Re-export main types at crate root
pub use account::{Account, UserMetadata};
pub use config::{ProviderConfig, ProviderConfigBuilder};
pub use error::{AuthenticationError, ProfileError};
pub use login::{AuthOutcome, LoginOrchestrator, MIN_PASSWORD_LEN};
pub use manager::{SessionManager, Subscription};
pub use profile::{Profile, ProfileStore, ProfileUpdate};
pub use provider::{
    Credentials, IdentityProvider, PasswordGrant, Registration, SessionChanges, SignUp,
    UserAttributes,
};
pub use race::{PRIMARY_SIGN_IN_TIMEOUT, Raced, race_deadline};
pub use role::Role;
pub use session::{Session, SessionChange, SessionEvent, TokenPair, access_token_expiry};
pub use state::{CurrentUser, StateAction, UserState, UserStateReader};
