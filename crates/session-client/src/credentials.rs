//! Credential storage for the current session
//!
//! Holds the single `CredentialState` of this client: whether a user is
//! logged in, their profile, and the current token pair. A tokio Mutex
//! serializes writers; readers get a cloned snapshot. Every write is
//! persisted through a `Persistence` backend so the session survives restart.
//!
//! Writes are crate-private. Outside code changes the session only through
//! `RefreshCoordinator::login` / `logout`, which take the coordinator's lock
//! first, so a refresh completion can never race a login or logout.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use session_token::{TokenPair, UserProfile};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Storage key for the persisted session. Bump the suffix when the layout changes.
pub const STORAGE_KEY: &str = "session:v1";

/// Session state as seen by the rest of the app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialState {
    pub is_authenticated: bool,
    pub user: Option<UserProfile>,
    pub token_pair: Option<TokenPair>,
}

impl CredentialState {
    pub fn authenticated(user: UserProfile, token_pair: TokenPair) -> Self {
        Self {
            is_authenticated: true,
            user: Some(user),
            token_pair: Some(token_pair),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.token_pair.as_ref().map(|p| p.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.token_pair.as_ref().map(|p| p.refresh_token.as_str())
    }
}

/// Key-value backend the store persists into.
///
/// Uses `Pin<Box<dyn Future>>` return types so it can be held as
/// `Arc<dyn Persistence>`.
pub trait Persistence: Send + Sync {
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<CredentialState>>> + Send + '_>>;

    fn save<'a>(
        &'a self,
        state: &'a CredentialState,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Thread-safe session store.
pub struct CredentialStore {
    persistence: std::sync::Arc<dyn Persistence>,
    state: Mutex<CredentialState>,
    authenticated: watch::Sender<bool>,
}

impl CredentialStore {
    /// Restore the persisted session, or start empty if there is none.
    ///
    /// A restored access token may already be expired. That is expected and
    /// handled by the normal refresh path on the first request.
    pub async fn load(persistence: std::sync::Arc<dyn Persistence>) -> Result<Self> {
        let state = match persistence.load().await? {
            Some(state) => {
                info!(
                    authenticated = state.is_authenticated,
                    "restored persisted session"
                );
                state
            }
            None => {
                info!("no persisted session, starting logged out");
                CredentialState::default()
            }
        };
        let (authenticated, _) = watch::channel(state.is_authenticated);
        Ok(Self {
            persistence,
            state: Mutex::new(state),
            authenticated,
        })
    }

    /// Snapshot of the current state.
    pub async fn get(&self) -> CredentialState {
        self.state.lock().await.clone()
    }

    /// Watch the authenticated flag, e.g. to redirect to login on logout.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }

    /// Replace the whole session. Used on login and refresh success.
    ///
    /// The in-memory state is updated even if persisting fails; the
    /// persistence error is still returned.
    pub(crate) async fn set_authenticated(
        &self,
        user: UserProfile,
        token_pair: TokenPair,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        debug!(user_id = %user.id, "storing authenticated session");
        *state = CredentialState::authenticated(user, token_pair);
        self.authenticated.send_replace(true);
        self.persistence.save(&state).await
    }

    /// Reset to the logged-out state. Used on logout and refresh failure.
    pub(crate) async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = CredentialState::default();
        self.authenticated.send_replace(false);
        debug!("cleared session");
        self.persistence.save(&state).await
    }
}

/// JSON file holding a key-value map; the session lives under [`STORAGE_KEY`].
///
/// All writes use atomic temp-file + rename and 0600 permissions.
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_map(&self) -> Result<HashMap<String, serde_json::Value>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Persistence(format!("reading session file: {e}")))?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::Persistence(format!(
                "parsing session file {}: {e}",
                self.path.display()
            ))
        })
    }
}

impl Persistence for FilePersistence {
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<CredentialState>>> + Send + '_>> {
        Box::pin(async move {
            // An unreadable session is a logged-out session, not a crash.
            let mut map = match self.read_map().await {
                Ok(map) => map,
                Err(e) => {
                    warn!(error = %e, "discarding unreadable session file");
                    return Ok(None);
                }
            };
            match map.remove(STORAGE_KEY) {
                Some(value) => match serde_json::from_value::<CredentialState>(value) {
                    Ok(state) => Ok(Some(state)),
                    Err(e) => {
                        warn!(path = %self.path.display(), error = %e, "discarding unreadable persisted session");
                        Ok(None)
                    }
                },
                None => Ok(None),
            }
        })
    }

    /// Fails without writing if the existing file cannot be parsed, so keys
    /// owned by other parts of the app are never overwritten.
    fn save<'a>(
        &'a self,
        state: &'a CredentialState,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut map = self.read_map().await?;
            let value = serde_json::to_value(state)
                .map_err(|e| Error::Persistence(format!("serializing session: {e}")))?;
            map.insert(STORAGE_KEY.to_string(), value);
            write_atomic(&self.path, &map).await
        })
    }
}

/// In-memory backend, used in tests and for ephemeral sessions.
#[derive(Default)]
pub struct MemoryPersistence {
    slot: Mutex<Option<String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Pin<Box<dyn Future<Output = Result<Option<CredentialState>>> + Send + '_>> {
        Box::pin(async move {
            match self.slot.lock().await.as_deref() {
                Some(raw) => serde_json::from_str(raw)
                    .map(Some)
                    .map_err(|e| Error::Persistence(format!("parsing session: {e}"))),
                None => Ok(None),
            }
        })
    }

    fn save<'a>(
        &'a self,
        state: &'a CredentialState,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let raw = serde_json::to_string(state)
                .map_err(|e| Error::Persistence(format!("serializing session: {e}")))?;
            *self.slot.lock().await = Some(raw);
            Ok(())
        })
    }
}

/// Write the session map to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target, so a crash mid-write never leaves a truncated session. Sets
/// 0600 permissions since the file contains a refresh token.
async fn write_atomic(path: &Path, data: &HashMap<String, serde_json::Value>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Persistence(format!("serializing session file: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Persistence("session path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Persistence(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Persistence(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Persistence(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}
