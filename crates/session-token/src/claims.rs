//! JWT claims carried by access and refresh tokens

use serde::{Deserialize, Serialize};

/// Claims payload shared by both token classes.
///
/// Timestamps are seconds since the unix epoch. `iss` and `aud` are only
/// emitted when the issuing options set them, which by default means access
/// tokens carry them and refresh tokens do not. Refresh tokens carry `jti`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user ID
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Unique token ID, set on refresh tokens so each one is distinct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// The user this token was issued to.
    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

/// Current unix time in seconds.
pub fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
