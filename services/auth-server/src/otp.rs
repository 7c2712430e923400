//! One-time password collaborator
//!
//! Delivery (email/SMS) is external; the service only needs "send" and
//! "verify". `InMemoryOtp` generates and checks codes locally and stands in
//! for a real provider in development and tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use rand::RngExt;
use serde::Serialize;
use session_token::now_secs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Wrong guesses allowed before a code is discarded.
const MAX_ATTEMPTS: u32 = 5;

/// Handle for a sent code. The code itself never leaves the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpTicket {
    pub id: String,
    /// Unix seconds
    pub expires_at: i64,
}

/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn OtpService>`).
pub trait OtpService: Send + Sync {
    fn send_otp<'a>(&'a self, destination: &'a str) -> Pin<Box<dyn Future<Output = OtpTicket> + Send + 'a>>;

    /// True only for the right code before expiry. A successful check consumes the code.
    fn verify_otp<'a>(&'a self, id: &'a str, code: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

struct Pending {
    code: String,
    expires_at: i64,
    attempts: u32,
}

pub struct InMemoryOtp {
    ttl_secs: i64,
    pending: Mutex<HashMap<String, Pending>>,
}

impl InMemoryOtp {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl_secs,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Peek at an outstanding code, standing in for reading the delivered message.
    #[cfg(test)]
    pub async fn code_for(&self, id: &str) -> Option<String> {
        self.pending.lock().await.get(id).map(|p| p.code.clone())
    }
}

fn generate_code() -> String {
    let mut bytes = [0u8; 4];
    rand::rng().fill(&mut bytes);
    format!("{:06}", u32::from_le_bytes(bytes) % 1_000_000)
}

impl OtpService for InMemoryOtp {
    fn send_otp<'a>(&'a self, destination: &'a str) -> Pin<Box<dyn Future<Output = OtpTicket> + Send + 'a>> {
        Box::pin(async move {
            let now = now_secs();
            let ticket = OtpTicket {
                id: uuid::Uuid::new_v4().to_string(),
                expires_at: now + self.ttl_secs,
            };

            let mut pending = self.pending.lock().await;
            pending.retain(|_, p| p.expires_at > now);
            pending.insert(
                ticket.id.clone(),
                Pending {
                    code: generate_code(),
                    expires_at: ticket.expires_at,
                    attempts: 0,
                },
            );
            info!(otp_id = %ticket.id, destination, "one-time code issued");
            ticket
        })
    }

    fn verify_otp<'a>(&'a self, id: &'a str, code: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            let mut pending = self.pending.lock().await;
            let Some(entry) = pending.get_mut(id) else {
                return false;
            };
            if entry.expires_at <= now_secs() {
                pending.remove(id);
                debug!(otp_id = %id, "one-time code expired");
                return false;
            }
            if entry.code == code {
                pending.remove(id);
                return true;
            }
            entry.attempts += 1;
            if entry.attempts >= MAX_ATTEMPTS {
                pending.remove(id);
                debug!(otp_id = %id, "one-time code discarded after too many attempts");
            }
            false
        })
    }
}
