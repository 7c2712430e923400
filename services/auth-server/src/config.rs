//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! Signing secrets are loaded from ACCESS_TOKEN_SECRET / REFRESH_TOKEN_SECRET
//! or from secret files, never stored in the TOML directly.

use common::Secret;
use serde::Deserialize;
use session_token::constants::{
    ACCESS_SECRET_ENV, DEFAULT_ACCESS_TTL_SECS, DEFAULT_AUDIENCE, DEFAULT_ISSUER,
    DEFAULT_REFRESH_TTL_SECS, REFRESH_SECRET_ENV,
};
use session_token::{SigningConfig, TokenOptions};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub tokens: TokensConfig,
    #[serde(default)]
    pub otp: OtpConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Whether a refresh hands out a new refresh token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// Refresh returns a new access token and the same refresh token.
    #[default]
    Reuse,
    /// Refresh returns a new pair and revokes the presented refresh token.
    Rotate,
}

/// Token issuing settings
#[derive(Debug, Deserialize)]
pub struct TokensConfig {
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
    #[serde(default)]
    pub rotation: RotationPolicy,
    /// Path to a file containing the access secret (alternative to ACCESS_TOKEN_SECRET)
    #[serde(default)]
    pub access_secret_file: Option<PathBuf>,
    /// Path to a file containing the refresh secret (alternative to REFRESH_TOKEN_SECRET)
    #[serde(default)]
    pub refresh_secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub access_secret: Option<Secret<String>>,
    #[serde(skip)]
    pub refresh_secret: Option<Secret<String>>,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            audience: default_audience(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            rotation: RotationPolicy::default(),
            access_secret_file: None,
            refresh_secret_file: None,
            access_secret: None,
            refresh_secret: None,
        }
    }
}

/// One-time password settings
#[derive(Debug, Deserialize)]
pub struct OtpConfig {
    #[serde(default = "default_otp_ttl")]
    pub ttl_secs: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_otp_ttl(),
        }
    }
}

fn default_max_connections() -> usize {
    1000
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_string()
}

fn default_audience() -> String {
    DEFAULT_AUDIENCE.to_string()
}

fn default_access_ttl() -> i64 {
    DEFAULT_ACCESS_TTL_SECS
}

fn default_refresh_ttl() -> i64 {
    DEFAULT_REFRESH_TTL_SECS
}

fn default_otp_ttl() -> i64 {
    10 * 60
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order, per token class:
    /// 1. ACCESS_TOKEN_SECRET / REFRESH_TOKEN_SECRET env var
    /// 2. access_secret_file / refresh_secret_file path from config
    ///
    /// A secret that is missing or blank after both is a startup failure.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }
        if config.tokens.access_ttl_secs <= 0 {
            return Err(common::Error::Config(
                "access_ttl_secs must be greater than 0".into(),
            ));
        }
        if config.tokens.refresh_ttl_secs <= 0 {
            return Err(common::Error::Config(
                "refresh_ttl_secs must be greater than 0".into(),
            ));
        }
        if config.otp.ttl_secs <= 0 {
            return Err(common::Error::Config(
                "otp ttl_secs must be greater than 0".into(),
            ));
        }

        config.tokens.access_secret = Some(resolve_secret(
            ACCESS_SECRET_ENV,
            config.tokens.access_secret_file.as_deref(),
        )?);
        config.tokens.refresh_secret = Some(resolve_secret(
            REFRESH_SECRET_ENV,
            config.tokens.refresh_secret_file.as_deref(),
        )?);

        // Surface secret problems (e.g. identical secrets) at load time
        config.signing()?;
        Ok(config)
    }

    /// Build the token signing configuration from the resolved secrets.
    pub fn signing(&self) -> common::Result<SigningConfig> {
        let access = self
            .tokens
            .access_secret
            .as_ref()
            .ok_or(common::Error::MissingSecret(ACCESS_SECRET_ENV))?;
        let refresh = self
            .tokens
            .refresh_secret
            .as_ref()
            .ok_or(common::Error::MissingSecret(REFRESH_SECRET_ENV))?;

        let signing = SigningConfig::new(access.expose(), refresh.expose())
            .map_err(|e| common::Error::Config(e.to_string()))?;
        Ok(signing
            .with_access_options(TokenOptions {
                expires_in: self.tokens.access_ttl_secs,
                issuer: Some(self.tokens.issuer.clone()),
                audience: Some(self.tokens.audience.clone()),
            })
            .with_refresh_options(TokenOptions::refresh().with_expires_in(self.tokens.refresh_ttl_secs)))
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("auth-server.toml")
    }
}

/// Env var takes precedence over file. Blank values count as missing.
fn resolve_secret(env_key: &'static str, file: Option<&Path>) -> common::Result<Secret<String>> {
    if let Ok(value) = std::env::var(env_key) {
        return Secret::non_blank(value).ok_or(common::Error::MissingSecret(env_key));
    }
    if let Some(file) = file {
        let value = std::fs::read_to_string(file).map_err(|e| {
            common::Error::Config(format!(
                "failed to read secret file {}: {e}",
                file.display()
            ))
        })?;
        return Secret::non_blank(value.trim().to_owned())
            .ok_or(common::Error::MissingSecret(env_key));
    }
    Err(common::Error::MissingSecret(env_key))
}
