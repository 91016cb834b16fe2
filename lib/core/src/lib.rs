//! Core types shared by every urbansetu crate.
//!
//! Identifiers for records owned by the hosted identity and storage
//! provider. Errors live with the crate that raises them.

pub mod id;

pub use id::{AccountId, ComplaintId, ParseIdError};
