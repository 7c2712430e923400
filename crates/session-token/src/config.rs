//! Signing configuration
//!
//! Two independent HS256 secrets: one for access tokens, one for refresh
//! tokens. Compromise of one must not let an attacker forge the other class,
//! so identical secrets are rejected.

use common::Secret;

use crate::constants::{
    ACCESS_SECRET_ENV, ACCESS_TTL_ENV, AUDIENCE_ENV, DEFAULT_ACCESS_TTL_SECS, DEFAULT_AUDIENCE,
    DEFAULT_ISSUER, DEFAULT_REFRESH_TTL_SECS, ISSUER_ENV, REFRESH_SECRET_ENV, REFRESH_TTL_ENV,
};
use crate::error::{Error, Result};

/// Per-class issuing options.
///
/// `expires_in` is signed: zero or negative lifetimes produce tokens that are
/// already expired, which is what tests and skew scenarios need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOptions {
    pub expires_in: i64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl TokenOptions {
    /// 15 minutes, issuer "app", audience "app-users".
    pub fn access() -> Self {
        Self {
            expires_in: DEFAULT_ACCESS_TTL_SECS,
            issuer: Some(DEFAULT_ISSUER.to_string()),
            audience: Some(DEFAULT_AUDIENCE.to_string()),
        }
    }

    /// 365 days, no issuer or audience claim.
    pub fn refresh() -> Self {
        Self {
            expires_in: DEFAULT_REFRESH_TTL_SECS,
            issuer: None,
            audience: None,
        }
    }

    pub fn with_expires_in(mut self, secs: i64) -> Self {
        self.expires_in = secs;
        self
    }
}

/// Secrets plus options for both token classes.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub(crate) access_secret: Secret<String>,
    pub(crate) refresh_secret: Secret<String>,
    pub access: TokenOptions,
    pub refresh: TokenOptions,
}

impl SigningConfig {
    /// Build from explicit secrets with default options.
    ///
    /// Fails if either secret is blank or if both are the same.
    pub fn new(access_secret: &str, refresh_secret: &str) -> Result<Self> {
        let access_secret = Secret::non_blank(access_secret.to_string())
            .ok_or_else(|| Error::Config("access token secret is missing or blank".into()))?;
        let refresh_secret = Secret::non_blank(refresh_secret.to_string())
            .ok_or_else(|| Error::Config("refresh token secret is missing or blank".into()))?;
        if access_secret.expose() == refresh_secret.expose() {
            return Err(Error::Config(
                "access and refresh token secrets must differ".into(),
            ));
        }
        Ok(Self {
            access_secret,
            refresh_secret,
            access: TokenOptions::access(),
            refresh: TokenOptions::refresh(),
        })
    }

    /// Read signing configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read signing configuration through an arbitrary key lookup.
    ///
    /// Secrets are required. Issuer, audience and lifetimes fall back to the
    /// defaults when unset; a lifetime that is set but not an integer is an
    /// error rather than a silent default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let access_secret = lookup(ACCESS_SECRET_ENV)
            .ok_or_else(|| Error::Config(format!("{ACCESS_SECRET_ENV} is not set")))?;
        let refresh_secret = lookup(REFRESH_SECRET_ENV)
            .ok_or_else(|| Error::Config(format!("{REFRESH_SECRET_ENV} is not set")))?;
        let mut config = Self::new(&access_secret, &refresh_secret)?;

        if let Some(issuer) = lookup(ISSUER_ENV) {
            config.access.issuer = Some(issuer);
        }
        if let Some(audience) = lookup(AUDIENCE_ENV) {
            config.access.audience = Some(audience);
        }
        if let Some(ttl) = lookup(ACCESS_TTL_ENV) {
            config.access.expires_in = parse_ttl(ACCESS_TTL_ENV, &ttl)?;
        }
        if let Some(ttl) = lookup(REFRESH_TTL_ENV) {
            config.refresh.expires_in = parse_ttl(REFRESH_TTL_ENV, &ttl)?;
        }
        Ok(config)
    }

    pub fn with_access_options(mut self, options: TokenOptions) -> Self {
        self.access = options;
        self
    }

    pub fn with_refresh_options(mut self, options: TokenOptions) -> Self {
        self.refresh = options;
        self
    }
}

fn parse_ttl(key: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|e| Error::Config(format!("{key} must be an integer number of seconds: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secrets_set() {
        let config = SigningConfig::from_lookup(lookup_from(&[
            (ACCESS_SECRET_ENV, "access-secret"),
            (REFRESH_SECRET_ENV, "refresh-secret"),
        ]))
        .unwrap();
        assert_eq!(config.access, TokenOptions::access());
        assert_eq!(config.refresh, TokenOptions::refresh());
        assert_eq!(config.access.issuer.as_deref(), Some("app"));
        assert_eq!(config.access.audience.as_deref(), Some("app-users"));
    }

    #[test]
    fn missing_access_secret_fails_closed() {
        let err = SigningConfig::from_lookup(lookup_from(&[(REFRESH_SECRET_ENV, "refresh")]))
            .unwrap_err();
        assert!(err.to_string().contains(ACCESS_SECRET_ENV), "got: {err}");
    }

    #[test]
    fn blank_refresh_secret_fails_closed() {
        let err = SigningConfig::from_lookup(lookup_from(&[
            (ACCESS_SECRET_ENV, "access"),
            (REFRESH_SECRET_ENV, "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn identical_secrets_rejected() {
        let err = SigningConfig::new("same", "same").unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn overrides_are_read() {
        let config = SigningConfig::from_lookup(lookup_from(&[
            (ACCESS_SECRET_ENV, "a"),
            (REFRESH_SECRET_ENV, "r"),
            (ISSUER_ENV, "chat-api"),
            (AUDIENCE_ENV, "chat-mobile"),
            (ACCESS_TTL_ENV, "60"),
            (REFRESH_TTL_ENV, "3600"),
        ]))
        .unwrap();
        assert_eq!(config.access.issuer.as_deref(), Some("chat-api"));
        assert_eq!(config.access.audience.as_deref(), Some("chat-mobile"));
        assert_eq!(config.access.expires_in, 60);
        assert_eq!(config.refresh.expires_in, 3600);
    }

    #[test]
    fn non_numeric_ttl_is_an_error() {
        let err = SigningConfig::from_lookup(lookup_from(&[
            (ACCESS_SECRET_ENV, "a"),
            (REFRESH_SECRET_ENV, "r"),
            (ACCESS_TTL_ENV, "15m"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(ACCESS_TTL_ENV));
    }

    #[test]
    fn debug_does_not_leak_secrets() {
        let config = SigningConfig::new("access-secret-value", "refresh-secret-value").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("access-secret-value"));
        assert!(!debug.contains("refresh-secret-value"));
    }
}
