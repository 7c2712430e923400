//! Token defaults and wire constants
//!
//! Non-secret options have silent defaults. Signing secrets never do: they
//! must come from process configuration or startup fails.

/// Default `iss` claim on access tokens
pub const DEFAULT_ISSUER: &str = "app";

/// Default `aud` claim on access tokens
pub const DEFAULT_AUDIENCE: &str = "app-users";

/// Default access token lifetime (15 minutes)
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;

/// Default refresh token lifetime (365 days)
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Environment variable holding the access token signing secret
pub const ACCESS_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";

/// Environment variable holding the refresh token signing secret
pub const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

pub const ISSUER_ENV: &str = "TOKEN_ISSUER";
pub const AUDIENCE_ENV: &str = "TOKEN_AUDIENCE";
pub const ACCESS_TTL_ENV: &str = "ACCESS_TOKEN_TTL_SECS";
pub const REFRESH_TTL_ENV: &str = "REFRESH_TOKEN_TTL_SECS";

/// Error codes carried in `{"error":{"code": ...}}` response bodies.
///
/// Clients branch on these codes, never on the human-readable message.
pub mod codes {
    /// The access token's `exp` has passed. The only code that triggers refresh.
    pub const TOKEN_EXPIRED: &str = "token_expired";
    pub const TOKEN_MALFORMED: &str = "token_malformed";
    pub const TOKEN_NOT_YET_VALID: &str = "token_not_yet_valid";
    pub const TOKEN_UNKNOWN: &str = "token_unknown";
    /// Refresh token was superseded by rotation or revoked by a password reset
    pub const SESSION_REVOKED: &str = "session_revoked";
    pub const MISSING_TOKEN: &str = "missing_token";
}
