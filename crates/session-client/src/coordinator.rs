//! Single-flight access token refresh
//!
//! When any request sees an expired access token, the first caller starts a
//! refresh cycle and every caller that arrives while it is in flight joins
//! the same cycle's waiter list. One network call is made per cycle and its
//! outcome is cloned to every waiter.
//!
//! Cycle state machine:
//! - `Idle` -> `Refreshing` when a caller presents the current (stale) token
//! - `Refreshing` -> `Idle` on completion: store updated and waiters get the
//!   new access token, or store cleared and waiters get `SessionExpired`
//!
//! The cycle lock also serializes login, logout and shutdown. Each of those
//! bumps the generation counter, so a refresh that completes after the
//! session was torn down or replaced is discarded instead of resurrecting it.
//! Lock order is always cycle first, then store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use session_token::{TokenPair, UserProfile};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::transport::RefreshClient;

/// Bound on a single refresh call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

type Waiter = oneshot::Sender<Result<String>>;

enum Phase {
    Idle,
    Refreshing { waiters: Vec<Waiter> },
}

struct Cycle {
    generation: u64,
    phase: Phase,
}

impl Cycle {
    /// Reject pending waiters and invalidate any in-flight refresh.
    fn cancel(&mut self) -> usize {
        self.generation += 1;
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Refreshing { waiters } => {
                let n = waiters.len();
                for waiter in waiters {
                    let _ = waiter.send(Err(Error::Cancelled));
                }
                n
            }
            Phase::Idle => 0,
        }
    }
}

struct Inner {
    store: Arc<CredentialStore>,
    refresher: Arc<dyn RefreshClient>,
    timeout: Duration,
    cycle: Mutex<Cycle>,
    refresh_calls: AtomicU64,
}

/// Owns the refresh cycle and is the only writer of the credential store.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<CredentialStore>, refresher: Arc<dyn RefreshClient>) -> Self {
        Self::with_timeout(store, refresher, DEFAULT_REFRESH_TIMEOUT)
    }

    pub fn with_timeout(
        store: Arc<CredentialStore>,
        refresher: Arc<dyn RefreshClient>,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                refresher,
                timeout,
                cycle: Mutex::new(Cycle {
                    generation: 0,
                    phase: Phase::Idle,
                }),
                refresh_calls: AtomicU64::new(0),
            }),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    /// Number of refresh network calls started so far.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_calls.load(Ordering::SeqCst)
    }

    /// Get a usable access token after `stale` was rejected as expired.
    ///
    /// Joins the in-flight cycle if there is one. Otherwise, if `stale` is no
    /// longer the stored token (an earlier cycle already replaced it), returns
    /// the stored token without refreshing. Passing `None` always refreshes.
    ///
    /// Fails with `NoSession` when no refresh token is stored, without any
    /// network call.
    pub async fn await_valid_token(&self, stale: Option<&str>) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        {
            let mut cycle = self.inner.cycle.lock().await;
            if let Phase::Refreshing { waiters } = &mut cycle.phase {
                waiters.push(tx);
                debug!(waiters = waiters.len(), "joined in-flight refresh");
            } else {
                let state = self.inner.store.get().await;
                let Some(pair) = state.token_pair else {
                    if state.is_authenticated {
                        self.inner.store.clear().await?;
                    }
                    debug!("refresh requested without a stored session");
                    return Err(Error::NoSession);
                };
                if stale.is_some_and(|stale| stale != pair.access_token) {
                    debug!("stale token already superseded, reusing current token");
                    return Ok(pair.access_token);
                }

                cycle.generation += 1;
                let generation = cycle.generation;
                cycle.phase = Phase::Refreshing { waiters: vec![tx] };
                debug!(generation, "starting refresh cycle");
                tokio::spawn(run_cycle(self.inner.clone(), generation, pair.refresh_token));
            }
        }

        rx.await.unwrap_or(Err(Error::Cancelled))
    }

    /// Start a new session, cancelling any refresh in flight.
    pub async fn login(&self, user: UserProfile, token_pair: TokenPair) -> Result<()> {
        let mut cycle = self.inner.cycle.lock().await;
        let cancelled = cycle.cancel();
        info!(user_id = %user.id, cancelled, "session started");
        self.inner.store.set_authenticated(user, token_pair).await
    }

    /// End the session, cancelling any refresh in flight.
    pub async fn logout(&self) -> Result<()> {
        let mut cycle = self.inner.cycle.lock().await;
        let cancelled = cycle.cancel();
        info!(cancelled, "session ended");
        self.inner.store.clear().await
    }

    /// Cancel pending waiters without touching the stored session.
    pub async fn shutdown(&self) {
        let mut cycle = self.inner.cycle.lock().await;
        let cancelled = cycle.cancel();
        debug!(cancelled, "refresh coordinator shut down");
    }

    #[cfg(test)]
    pub(crate) async fn pending_waiters(&self) -> usize {
        match &self.inner.cycle.lock().await.phase {
            Phase::Refreshing { waiters } => waiters.len(),
            Phase::Idle => 0,
        }
    }
}

/// Perform one refresh call and settle the cycle it belongs to.
///
/// Runs detached so that a caller dropping its future cannot strand the
/// other waiters.
async fn run_cycle(inner: Arc<Inner>, generation: u64, refresh_token: String) {
    inner.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let outcome = match tokio::time::timeout(inner.timeout, inner.refresher.refresh(&refresh_token)).await {
        Ok(Ok(session)) => Ok(session),
        Ok(Err(Error::SessionExpired(reason))) => Err(reason),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("refresh timed out after {}s", inner.timeout.as_secs_f64())),
    };

    let mut cycle = inner.cycle.lock().await;
    if cycle.generation != generation {
        debug!(generation, current = cycle.generation, "discarding superseded refresh result");
        return;
    }
    let waiters = match std::mem::replace(&mut cycle.phase, Phase::Idle) {
        Phase::Refreshing { waiters } => waiters,
        Phase::Idle => Vec::new(),
    };

    let result = match outcome {
        Ok(session) => {
            let access_token = session.tokens.access_token.clone();
            if let Err(e) = inner.store.set_authenticated(session.user, session.tokens).await {
                warn!(error = %e, "refreshed session not persisted");
            }
            metrics::counter!("session_refresh_total", "outcome" => "success").increment(1);
            info!(waiters = waiters.len(), "access token refreshed");
            Ok(access_token)
        }
        Err(reason) => {
            if let Err(e) = inner.store.clear().await {
                warn!(error = %e, "cleared session not persisted");
            }
            metrics::counter!("session_refresh_total", "outcome" => "failure").increment(1);
            warn!(reason = %reason, waiters = waiters.len(), "refresh failed, session ended");
            Err(Error::SessionExpired(reason))
        }
    };

    for waiter in waiters {
        let _ = waiter.send(result.clone());
    }
}
