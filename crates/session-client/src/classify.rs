//! Auth classification of backend responses
//!
//! Only a 401 carrying one of the typed auth codes is an auth signal. A 401
//! with any other body (or any other status) passes through to the caller
//! unmodified, so generic errors never end a session.

use session_token::{ErrorBody, VerifyError, codes};

/// What a response means for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSignal {
    /// Not an auth failure; hand the response back as-is.
    Pass,
    /// Access token expired; recoverable by refreshing once.
    Expired,
    /// Token refused for a non-recoverable reason.
    Rejected(VerifyError),
    /// The server revoked the session (e.g. after a password reset).
    Revoked,
}

/// Classify a response by status and body.
pub fn classify_response(status: u16, body: &str) -> AuthSignal {
    if status != 401 {
        return AuthSignal::Pass;
    }
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return AuthSignal::Pass;
    };
    match parsed.error.code.as_str() {
        codes::SESSION_REVOKED => AuthSignal::Revoked,
        codes::MISSING_TOKEN => AuthSignal::Rejected(VerifyError::Malformed),
        code => match VerifyError::from_code(code) {
            Some(VerifyError::Expired) => AuthSignal::Expired,
            Some(kind) => AuthSignal::Rejected(kind),
            None => AuthSignal::Pass,
        },
    }
}
