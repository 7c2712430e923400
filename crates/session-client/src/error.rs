//! Error types for client session operations
//!
//! Every variant is `Clone` so that one refresh outcome can be fanned out to
//! all callers waiting on the same cycle.

use session_token::VerifyError;

/// Errors from authenticated requests and session refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No refresh token is stored; the user must log in.
    #[error("no session: no refresh token stored")]
    NoSession,

    /// The refresh call failed, timed out, or the retried request was still
    /// rejected as expired. The store has been cleared.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// The session was torn down (logout, login, shutdown) while a refresh
    /// was in flight.
    #[error("refresh cancelled")]
    Cancelled,

    /// The server rejected the token as malformed, not yet valid, or
    /// unverifiable. The store has been cleared.
    #[error("token rejected: {0}")]
    Rejected(VerifyError),

    /// Transport-level failure. Never changes session state.
    #[error("network error: {0}")]
    Network(String),

    /// An unauthenticated call (login) was refused by the server.
    #[error("request refused ({status}): {message}")]
    Refused { status: u16, message: String },

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl Error {
    /// Whether this error means the user has been logged out.
    pub fn is_session_ending(&self) -> bool {
        matches!(
            self,
            Error::NoSession | Error::SessionExpired(_) | Error::Rejected(_)
        )
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
