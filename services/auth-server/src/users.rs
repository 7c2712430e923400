//! In-memory user accounts
//!
//! Passwords are stored as Argon2id PHC strings. The store also keeps the
//! fingerprint of each user's active refresh token, which is what the
//! `Rotate` policy checks and what a password reset revokes.

use std::collections::HashMap;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use session_token::UserProfile;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ApiError, Result};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub verified: bool,
    password_hash: String,
    /// SHA-256 of the active refresh token, hex
    refresh_fingerprint: Option<String>,
}

impl UserRecord {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            verified: self.verified,
        }
    }
}

#[derive(Default)]
struct Users {
    by_id: HashMap<String, UserRecord>,
    id_by_email: HashMap<String, String>,
}

#[derive(Default)]
pub struct UserStore {
    inner: RwLock<Users>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    /// Create an unverified account.
    pub async fn create(&self, email: &str, password: &str, name: Option<String>) -> Result<UserRecord> {
        let email = normalize_email(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let mut users = self.inner.write().await;
        if users.id_by_email.contains_key(&email) {
            return Err(ApiError::EmailTaken);
        }
        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.clone(),
            name: name.filter(|n| !n.trim().is_empty()),
            verified: false,
            password_hash,
            refresh_fingerprint: None,
        };
        users.id_by_email.insert(email, record.id.clone());
        users.by_id.insert(record.id.clone(), record.clone());
        info!(user_id = %record.id, "user registered");
        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Option<UserRecord> {
        self.inner.read().await.by_id.get(id).cloned()
    }

    pub async fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let email = email.trim().to_lowercase();
        let users = self.inner.read().await;
        users
            .id_by_email
            .get(&email)
            .and_then(|id| users.by_id.get(id))
            .cloned()
    }

    /// Check an email/password pair. Unknown email and wrong password are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserRecord> {
        let record = self
            .find_by_email(email)
            .await
            .ok_or(ApiError::InvalidCredentials)?;
        if verify_password(password, &record.password_hash)? {
            Ok(record)
        } else {
            debug!(user_id = %record.id, "password mismatch");
            Err(ApiError::InvalidCredentials)
        }
    }

    pub async fn mark_verified(&self, id: &str) -> Option<UserRecord> {
        let mut users = self.inner.write().await;
        let record = users.by_id.get_mut(id)?;
        record.verified = true;
        Some(record.clone())
    }

    pub async fn set_password(&self, id: &str, password: &str) -> Result<()> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;
        let mut users = self.inner.write().await;
        let record = users.by_id.get_mut(id).ok_or(ApiError::UserNotFound)?;
        record.password_hash = password_hash;
        info!(user_id = %id, "password changed");
        Ok(())
    }

    /// Record `refresh_token` as the only refresh token accepted for `id`.
    pub async fn set_active_refresh(&self, id: &str, refresh_token: &str) {
        if let Some(record) = self.inner.write().await.by_id.get_mut(id) {
            record.refresh_fingerprint = Some(fingerprint(refresh_token));
        }
    }

    pub async fn revoke_refresh(&self, id: &str) {
        if let Some(record) = self.inner.write().await.by_id.get_mut(id) {
            record.refresh_fingerprint = None;
        }
    }

    /// Replace the active refresh token with `next` only if `presented` is
    /// the active one. Check and swap happen under one write lock, so of two
    /// refreshes presenting the same token exactly one succeeds.
    pub async fn rotate_refresh(&self, id: &str, presented: &str, next: &str) -> bool {
        let mut users = self.inner.write().await;
        let Some(record) = users.by_id.get_mut(id) else {
            return false;
        };
        if record.refresh_fingerprint.as_deref() != Some(fingerprint(presented).as_str()) {
            return false;
        }
        record.refresh_fingerprint = Some(fingerprint(next));
        true
    }
}

fn fingerprint(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::BadRequest("email address is invalid".into())),
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ApiError::Internal(format!("invalid password hash format: {e}")))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ApiError::Internal(format!("password verification failed: {e}"))),
    }
}
