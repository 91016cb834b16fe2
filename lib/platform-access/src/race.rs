//! Deadline races for calls that may stall.

use std::future::Future;
use std::time::Duration;

/// How long the primary sign-in pathway gets before the token-endpoint
/// fallback takes over.
pub const PRIMARY_SIGN_IN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Outcome of racing a future against a deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Raced<T> {
    /// The future resolved before the deadline.
    Completed(T),
    /// The deadline passed first. The future was dropped unresolved.
    TimedOut,
}

impl<T> Raced<T> {
    /// Returns true if the deadline won.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Returns the completed value, if any.
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::TimedOut => None,
        }
    }
}

/// Races `future` against `limit`.
///
/// The future is owned by the race: when the deadline wins it is dropped
/// here, so whatever it would eventually have produced is discarded and
/// never reaches the caller.
pub async fn race_deadline<F>(future: F, limit: Duration) -> Raced<F::Output>
where
    F: Future,
{
    match tokio::time::timeout(limit, future).await {
        Ok(value) => Raced::Completed(value),
        Err(_elapsed) => Raced::TimedOut,
    }
}
