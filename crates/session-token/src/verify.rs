//! Token verification
//!
//! Signature, algorithm, issuer and audience checks are delegated to
//! `jsonwebtoken`. Time checks are done here so that `exp == now` already
//! counts as expired and so the outcome is one of the four typed variants.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use crate::claims::{Claims, now_secs};
use crate::codec::ALGORITHM;
use crate::config::SigningConfig;
use crate::error::VerifyError;

/// Optional issuer/audience a token must carry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectation {
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Verify `token` against `secret` without issuer/audience pinning.
pub fn verify(token: &str, secret: &str) -> Result<Claims, VerifyError> {
    verify_at(token, secret, &Expectation::default(), now_secs())
}

/// Verify `token` as of `now`.
pub fn verify_at(
    token: &str,
    secret: &str,
    expect: &Expectation,
    now: i64,
) -> Result<Claims, VerifyError> {
    if secret.trim().is_empty() {
        return Err(VerifyError::Unknown);
    }

    let mut validation = Validation::new(ALGORITHM);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);
    if let Some(issuer) = &expect.issuer {
        validation.set_issuer(&[issuer]);
    }
    match &expect.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        let outcome = classify(e.kind());
        debug!(error = %e, outcome = outcome.code(), "token rejected");
        outcome
    })?
    .claims;

    if claims.nbf > now {
        return Err(VerifyError::NotYetValid);
    }
    if claims.exp <= now {
        return Err(VerifyError::Expired);
    }
    Ok(claims)
}

fn classify(kind: &ErrorKind) -> VerifyError {
    match kind {
        ErrorKind::ExpiredSignature => VerifyError::Expired,
        ErrorKind::ImmatureSignature => VerifyError::NotYetValid,
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => VerifyError::Malformed,
        _ => VerifyError::Unknown,
    }
}

/// Verifies both token classes against a [`SigningConfig`].
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    config: SigningConfig,
}

impl TokenVerifier {
    pub fn new(config: SigningConfig) -> Self {
        Self { config }
    }

    /// Verify an access token, pinning the configured issuer and audience.
    pub fn verify_access(&self, token: &str) -> Result<Claims, VerifyError> {
        self.verify_access_at(token, now_secs())
    }

    pub fn verify_access_at(&self, token: &str, now: i64) -> Result<Claims, VerifyError> {
        let expect = Expectation {
            issuer: self.config.access.issuer.clone(),
            audience: self.config.access.audience.clone(),
        };
        verify_at(token, self.config.access_secret.expose(), &expect, now)
    }

    /// Verify a refresh token with the refresh secret.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, VerifyError> {
        self.verify_refresh_at(token, now_secs())
    }

    pub fn verify_refresh_at(&self, token: &str, now: i64) -> Result<Claims, VerifyError> {
        let expect = Expectation {
            issuer: self.config.refresh.issuer.clone(),
            audience: self.config.refresh.audience.clone(),
        };
        verify_at(token, self.config.refresh_secret.expose(), &expect, now)
    }
}
