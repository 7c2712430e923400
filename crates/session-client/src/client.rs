//! Application-facing session client
//!
//! Wires the credential store, refresh coordinator and interceptor over one
//! `HttpClient`. This is the only type most callers need.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use session_token::UserProfile;
use tokio::sync::watch;

use crate::coordinator::{DEFAULT_REFRESH_TIMEOUT, RefreshCoordinator};
use crate::credentials::{CredentialState, CredentialStore, FilePersistence, Persistence};
use crate::error::Result;
use crate::interceptor::Interceptor;
use crate::transport::{ApiRequest, ApiResponse, HttpClient};

/// Client-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,
}

fn default_refresh_timeout_secs() -> u64 {
    DEFAULT_REFRESH_TIMEOUT.as_secs()
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
        }
    }
}

pub struct SessionClient {
    http: Arc<HttpClient>,
    coordinator: RefreshCoordinator,
    interceptor: Interceptor,
}

impl SessionClient {
    /// Restore any persisted session and build the client.
    pub async fn connect(config: ClientConfig, persistence: Arc<dyn Persistence>) -> Result<Self> {
        let http = Arc::new(HttpClient::new(config.base_url)?);
        let store = Arc::new(CredentialStore::load(persistence).await?);
        let coordinator = RefreshCoordinator::with_timeout(
            store,
            http.clone(),
            Duration::from_secs(config.refresh_timeout_secs),
        );
        let interceptor = Interceptor::new(http.clone(), coordinator.clone());
        Ok(Self {
            http,
            coordinator,
            interceptor,
        })
    }

    /// Same as [`SessionClient::connect`] with the session in a JSON file.
    pub async fn connect_with_file(config: ClientConfig, path: PathBuf) -> Result<Self> {
        Self::connect(config, Arc::new(FilePersistence::new(path))).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let session = self.http.login(email, password).await?;
        let user = session.user.clone();
        self.coordinator.login(session.user, session.tokens).await?;
        Ok(user)
    }

    /// Complete OTP verification, which also starts a session.
    pub async fn verify_otp(&self, otp_id: &str, code: &str) -> Result<UserProfile> {
        let session = self.http.verify_otp(otp_id, code).await?;
        let user = session.user.clone();
        self.coordinator.login(session.user, session.tokens).await?;
        Ok(user)
    }

    pub async fn logout(&self) -> Result<()> {
        self.coordinator.logout().await
    }

    /// Send an authenticated request; see [`Interceptor::execute`].
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.interceptor.execute(request).await
    }

    pub async fn state(&self) -> CredentialState {
        self.coordinator.store().get().await
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.coordinator.store().subscribe()
    }

    pub fn refresh_count(&self) -> u64 {
        self.coordinator.refresh_count()
    }

    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await
    }
}
