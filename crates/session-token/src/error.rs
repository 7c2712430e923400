//! Error types for token issuance and verification

use crate::constants::codes;

/// Errors from building or using a token codec.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or blank signing secret, or otherwise unusable signing config.
    /// Fatal at startup, never recoverable per request.
    #[error("token configuration error: {0}")]
    Config(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a token failed verification.
///
/// Only `Expired` is recoverable (by refreshing). Every other variant means
/// the token is forged, corrupted, or from a skewed clock and the session
/// must end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("token has expired")]
    Expired,

    #[error("token is malformed or has an invalid signature")]
    Malformed,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token could not be verified")]
    Unknown,
}

impl VerifyError {
    /// Stable error code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            VerifyError::Expired => codes::TOKEN_EXPIRED,
            VerifyError::Malformed => codes::TOKEN_MALFORMED,
            VerifyError::NotYetValid => codes::TOKEN_NOT_YET_VALID,
            VerifyError::Unknown => codes::TOKEN_UNKNOWN,
        }
    }

    /// Inverse of [`VerifyError::code`].
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            codes::TOKEN_EXPIRED => Some(VerifyError::Expired),
            codes::TOKEN_MALFORMED => Some(VerifyError::Malformed),
            codes::TOKEN_NOT_YET_VALID => Some(VerifyError::NotYetValid),
            codes::TOKEN_UNKNOWN => Some(VerifyError::Unknown),
            _ => None,
        }
    }
}
