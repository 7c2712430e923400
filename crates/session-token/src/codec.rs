//! Token issuance
//!
//! Both token classes are HS256 JWTs. The algorithm is fixed on both the
//! signing and verifying side; nothing is negotiated from the token header.

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use tracing::debug;

use crate::claims::{Claims, now_secs};
use crate::config::{SigningConfig, TokenOptions};
use crate::error::{Error, Result};
use crate::types::TokenPair;

/// The only algorithm this crate signs or accepts.
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// Sign a token for `user_id` issued at `now`.
///
/// Deterministic: identical inputs and timestamp yield an identical string.
pub fn issue_token_at(user_id: &str, secret: &str, options: &TokenOptions, now: i64) -> Result<String> {
    sign(user_id, secret, options, now, None)
}

/// Like [`issue_token_at`], with a `jti` claim. Distinct IDs yield distinct
/// tokens even within the same second.
pub fn issue_token_with_id_at(
    user_id: &str,
    secret: &str,
    options: &TokenOptions,
    now: i64,
    token_id: &str,
) -> Result<String> {
    sign(user_id, secret, options, now, Some(token_id))
}

fn sign(
    user_id: &str,
    secret: &str,
    options: &TokenOptions,
    now: i64,
    token_id: Option<&str>,
) -> Result<String> {
    if secret.trim().is_empty() {
        return Err(Error::Config("signing secret is missing or blank".into()));
    }
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        nbf: now,
        exp: now.saturating_add(options.expires_in),
        iss: options.issuer.clone(),
        aud: options.audience.clone(),
        jti: token_id.map(str::to_string),
    };
    encode(
        &Header::new(ALGORITHM),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Signing(e.to_string()))
}

fn new_token_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Sign an access token with the access secret, issued now.
pub fn issue_access_token(user_id: &str, secret: &str, options: &TokenOptions) -> Result<String> {
    issue_token_at(user_id, secret, options, now_secs())
}

/// Sign a refresh token with the refresh secret, issued now with a fresh `jti`.
pub fn issue_refresh_token(user_id: &str, secret: &str, options: &TokenOptions) -> Result<String> {
    issue_token_with_id_at(user_id, secret, options, now_secs(), &new_token_id())
}

/// Issues access/refresh tokens from a validated [`SigningConfig`].
#[derive(Debug, Clone)]
pub struct TokenCodec {
    config: SigningConfig,
}

impl TokenCodec {
    pub fn new(config: SigningConfig) -> Self {
        Self { config }
    }

    /// Build from process environment; see [`SigningConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        SigningConfig::from_env().map(Self::new)
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    pub fn issue_access_token(&self, user_id: &str) -> Result<String> {
        self.issue_access_token_at(user_id, now_secs())
    }

    pub fn issue_access_token_at(&self, user_id: &str, now: i64) -> Result<String> {
        issue_token_at(
            user_id,
            self.config.access_secret.expose(),
            &self.config.access,
            now,
        )
    }

    pub fn issue_refresh_token(&self, user_id: &str) -> Result<String> {
        self.issue_refresh_token_at(user_id, now_secs(), &new_token_id())
    }

    pub fn issue_refresh_token_at(&self, user_id: &str, now: i64, token_id: &str) -> Result<String> {
        issue_token_with_id_at(
            user_id,
            self.config.refresh_secret.expose(),
            &self.config.refresh,
            now,
            token_id,
        )
    }

    /// Issue a fresh access + refresh pair, the unit handed to clients.
    pub fn issue_pair(&self, user_id: &str) -> Result<TokenPair> {
        self.issue_pair_at(user_id, now_secs())
    }

    pub fn issue_pair_at(&self, user_id: &str, now: i64) -> Result<TokenPair> {
        let pair = TokenPair {
            access_token: self.issue_access_token_at(user_id, now)?,
            refresh_token: self.issue_refresh_token_at(user_id, now, &new_token_id())?,
            expires_in: u64::try_from(self.config.access.expires_in).unwrap_or(0),
        };
        debug!(user_id, expires_in = pair.expires_in, "issued token pair");
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::decode_header;

    fn codec() -> TokenCodec {
        TokenCodec::new(SigningConfig::new("access-secret", "refresh-secret").unwrap())
    }

    #[test]
    fn blank_secret_is_a_config_error() {
        let err = issue_access_token("user-1", "", &TokenOptions::access()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = issue_refresh_token("user-1", "  ", &TokenOptions::refresh()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn issuing_is_deterministic_for_a_fixed_timestamp() {
        let codec = codec();
        let a = codec.issue_access_token_at("user-1", 1_700_000_000).unwrap();
        let b = codec.issue_access_token_at("user-1", 1_700_000_000).unwrap();
        assert_eq!(a, b);
        let c = codec.issue_access_token_at("user-1", 1_700_000_001).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn refresh_tokens_are_unique_within_one_second() {
        let codec = codec();
        let a = codec.issue_pair_at("user-1", 1_700_000_000).unwrap();
        let b = codec.issue_pair_at("user-1", 1_700_000_000).unwrap();
        assert_eq!(a.access_token, b.access_token);
        assert_ne!(a.refresh_token, b.refresh_token);

        // Still deterministic once the ID is fixed
        let c = codec.issue_refresh_token_at("user-1", 1_700_000_000, "id-1").unwrap();
        let d = codec.issue_refresh_token_at("user-1", 1_700_000_000, "id-1").unwrap();
        assert_eq!(c, d);
    }

    #[test]
    fn header_pins_hs256() {
        let token = codec().issue_access_token("user-1").unwrap();
        let header = decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
    }

    #[test]
    fn access_and_refresh_tokens_differ() {
        let pair = codec().issue_pair_at("user-1", 1_700_000_000).unwrap();
        assert_ne!(pair.access_token, pair.refresh_token);
        assert_eq!(pair.expires_in, 900);
    }

    #[test]
    fn negative_lifetime_clamps_expires_in() {
        let config = SigningConfig::new("a", "r")
            .unwrap()
            .with_access_options(TokenOptions::access().with_expires_in(-1));
        let pair = TokenCodec::new(config).issue_pair("user-1").unwrap();
        assert_eq!(pair.expires_in, 0);
    }
}
