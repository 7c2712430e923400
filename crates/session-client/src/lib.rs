//! Client-side session lifecycle
//!
//! Keeps the current access/refresh pair, attaches it to outbound requests,
//! and recovers from access token expiry with a single shared refresh.
//!
//! Request lifecycle:
//! 1. `Interceptor` sends the request with the stored access token
//! 2. Backend answers 401 `token_expired` -> request waits on `RefreshCoordinator`
//! 3. First waiter starts one refresh call; later waiters join it
//! 4. Success: store updated, every waiter retries once with the new token
//! 5. Failure, or expired again after retry: store cleared, `SessionExpired`

pub mod classify;
pub mod client;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod interceptor;
pub mod transport;

pub use classify::{AuthSignal, classify_response};
pub use client::{ClientConfig, SessionClient};
pub use coordinator::{DEFAULT_REFRESH_TIMEOUT, RefreshCoordinator};
pub use credentials::{
    CredentialState, CredentialStore, FilePersistence, MemoryPersistence, Persistence, STORAGE_KEY,
};
pub use error::{Error, Result};
pub use interceptor::Interceptor;
pub use transport::{ApiRequest, ApiResponse, HttpClient, RefreshClient, Transport};
