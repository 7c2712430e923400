//! Session token issuance and verification
//!
//! Issues short-lived access tokens and long-lived refresh tokens as HS256
//! JWTs signed with two independent secrets, and verifies them into a typed
//! outcome. Also holds the wire types shared by the auth server and the
//! client (`TokenPair`, `UserProfile`, `SessionResponse`, `ErrorBody`).
//!
//! Token flow:
//! 1. Server builds a `SigningConfig` (fails closed without both secrets)
//! 2. Login/refresh calls `TokenCodec::issue_pair()`
//! 3. Protected routes call `TokenVerifier::verify_access()`
//! 4. Only `VerifyError::Expired` is answered with the `token_expired` code,
//!    the one signal that lets a client refresh instead of logging out

pub mod claims;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;
pub mod verify;

pub use claims::{Claims, now_secs};
pub use codec::{
    TokenCodec, issue_access_token, issue_refresh_token, issue_token_at, issue_token_with_id_at,
};
pub use config::{SigningConfig, TokenOptions};
pub use constants::codes;
pub use error::{Error, Result, VerifyError};
pub use types::{ErrorBody, ErrorDetail, RefreshRequest, SessionResponse, TokenPair, UserProfile};
pub use verify::{Expectation, TokenVerifier, verify, verify_at};
