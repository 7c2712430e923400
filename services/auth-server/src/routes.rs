//! Auth HTTP handlers
//!
//! Registration and password reset are two-step flows gated by a one-time
//! code. Every successful login, OTP verification and refresh returns the
//! same `{tokens, user}` body.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{FromRequestParts, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use session_token::{
    Claims, RefreshRequest, SessionResponse, TokenCodec, TokenPair, TokenVerifier, UserProfile,
    now_secs,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::RotationPolicy;
use crate::error::{ApiError, Result};
use crate::metrics;
use crate::otp::{OtpService, OtpTicket};
use crate::users::{UserRecord, UserStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OtpPurpose {
    VerifyEmail,
    ResetPassword,
}

/// Outstanding OTP ticket bound to the account it acts on.
#[derive(Debug, Clone)]
struct OtpBinding {
    user_id: String,
    purpose: OtpPurpose,
    expires_at: i64,
}

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub codec: TokenCodec,
    pub verifier: TokenVerifier,
    pub users: Arc<UserStore>,
    pub otp: Arc<dyn OtpService>,
    pub rotation: RotationPolicy,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
    otp_bindings: Arc<Mutex<HashMap<String, OtpBinding>>>,
}

impl AppState {
    pub fn new(
        codec: TokenCodec,
        users: Arc<UserStore>,
        otp: Arc<dyn OtpService>,
        rotation: RotationPolicy,
        prometheus: PrometheusHandle,
    ) -> Self {
        Self {
            verifier: TokenVerifier::new(codec.config().clone()),
            codec,
            users,
            otp,
            rotation,
            prometheus,
            started_at: Instant::now(),
            otp_bindings: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn send_otp(&self, user: &UserRecord, purpose: OtpPurpose) -> OtpTicket {
        let ticket = self.otp.send_otp(&user.email).await;
        let now = now_secs();
        let mut bindings = self.otp_bindings.lock().await;
        bindings.retain(|_, b| b.expires_at > now);
        bindings.insert(
            ticket.id.clone(),
            OtpBinding {
                user_id: user.id.clone(),
                purpose,
                expires_at: ticket.expires_at,
            },
        );
        ticket
    }

    /// Check a code and return the bound user id. The ticket is consumed on success.
    ///
    /// Expired bindings are dropped on sight. A binding whose ticket was
    /// locked out lingers until it expires and the next `send_otp` prunes it.
    async fn redeem_otp(&self, otp_id: &str, code: &str, purpose: OtpPurpose) -> Result<String> {
        let binding = {
            let mut bindings = self.otp_bindings.lock().await;
            let binding = bindings.get(otp_id).cloned().ok_or(ApiError::InvalidOtp)?;
            if binding.expires_at <= now_secs() {
                bindings.remove(otp_id);
                debug!(otp_id, "dropped expired one-time code binding");
                return Err(ApiError::InvalidOtp);
            }
            binding
        };
        if binding.purpose != purpose || !self.otp.verify_otp(otp_id, code).await {
            return Err(ApiError::InvalidOtp);
        }
        self.otp_bindings.lock().await.remove(otp_id);
        Ok(binding.user_id)
    }

    #[cfg(test)]
    async fn pending_bindings(&self) -> usize {
        self.otp_bindings.lock().await.len()
    }

    /// Issue a fresh pair for `user`.
    fn issue_session(&self, user: &UserRecord) -> Result<TokenPair> {
        let pair = self.codec.issue_pair(&user.id)?;
        metrics::record_token_issued("access");
        metrics::record_token_issued("refresh");
        Ok(pair)
    }

    async fn start_session(&self, user: &UserRecord) -> Result<SessionResponse> {
        let tokens = self.issue_session(user)?;
        if self.rotation == RotationPolicy::Rotate {
            self.users.set_active_refresh(&user.id, &tokens.refresh_token).await;
        }
        Ok(SessionResponse {
            tokens,
            user: user.profile(),
        })
    }
}

/// Verified access token claims, extracted from `Authorization: Bearer`.
pub struct AuthUser(pub Claims);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::MissingToken)?;

        state.verifier.verify_access(token).map(AuthUser).map_err(|kind| {
            metrics::record_verify_failure(kind.code());
            debug!(code = kind.code(), "access token rejected");
            ApiError::Token(kind)
        })
    }
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: String,
    pub otp_id: String,
    pub expires_at: i64,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let user = state.users.create(&req.email, &req.password, req.name).await?;
    let ticket = state.send_otp(&user, OtpPurpose::VerifyEmail).await;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            otp_id: ticket.id,
            expires_at: ticket.expires_at,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub otp_id: String,
    pub code: String,
}

async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<SessionResponse>> {
    let user_id = state
        .redeem_otp(&req.otp_id, &req.code, OtpPurpose::VerifyEmail)
        .await?;
    let user = state
        .users
        .mark_verified(&user_id)
        .await
        .ok_or(ApiError::UserNotFound)?;
    info!(user_id = %user.id, "email verified");
    Ok(Json(state.start_session(&user).await?))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let user = state.users.authenticate(&req.email, &req.password).await?;
    if !user.verified {
        return Err(ApiError::AccountUnverified);
    }
    info!(user_id = %user.id, "user logged in");
    Ok(Json(state.start_session(&user).await?))
}

async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<SessionResponse>> {
    let claims = state
        .verifier
        .verify_refresh(&req.refresh_token)
        .map_err(|kind| {
            metrics::record_verify_failure(kind.code());
            metrics::record_refresh("rejected");
            ApiError::Token(kind)
        })?;

    let Some(user) = state.users.get(claims.user_id()).await else {
        metrics::record_refresh("rejected");
        return Err(ApiError::SessionRevoked);
    };

    let tokens = match state.rotation {
        RotationPolicy::Reuse => {
            let access_token = state.codec.issue_access_token(&user.id)?;
            metrics::record_token_issued("access");
            TokenPair {
                access_token,
                refresh_token: req.refresh_token,
                expires_in: state.codec.config().access.expires_in.max(0) as u64,
            }
        }
        RotationPolicy::Rotate => {
            let tokens = state.issue_session(&user)?;
            if !state
                .users
                .rotate_refresh(&user.id, &req.refresh_token, &tokens.refresh_token)
                .await
            {
                warn!(user_id = %user.id, "superseded or revoked refresh token presented");
                metrics::record_refresh("rejected");
                return Err(ApiError::SessionRevoked);
            }
            tokens
        }
    };

    metrics::record_refresh("success");
    debug!(user_id = %user.id, "session refreshed");
    Ok(Json(SessionResponse {
        tokens,
        user: user.profile(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<OtpTicketResponse>> {
    let user = state
        .users
        .find_by_email(&req.email)
        .await
        .ok_or(ApiError::UserNotFound)?;
    let ticket = state.send_otp(&user, OtpPurpose::ResetPassword).await;
    Ok(Json(OtpTicketResponse {
        otp_id: ticket.id,
        expires_at: ticket.expires_at,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpTicketResponse {
    pub otp_id: String,
    pub expires_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub otp_id: String,
    pub code: String,
    pub password: String,
}

async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<StatusCode> {
    let user_id = state
        .redeem_otp(&req.otp_id, &req.code, OtpPurpose::ResetPassword)
        .await?;
    state.users.set_password(&user_id, &req.password).await?;
    if state.rotation == RotationPolicy::Rotate {
        state.users.revoke_refresh(&user_id).await;
        info!(user_id = %user_id, "refresh token revoked after password reset");
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
}

async fn me(State(state): State<AppState>, AuthUser(claims): AuthUser) -> Result<Json<MeResponse>> {
    let user = state
        .users
        .get(claims.user_id())
        .await
        .ok_or(ApiError::SessionRevoked)?;
    Ok(Json(MeResponse {
        user: user.profile(),
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::otp::InMemoryOtp;
    use axum::body::Body;
    use axum::http::Request;
    use session_token::{SigningConfig, TokenOptions, issue_token_at, now_secs};
    use tower::ServiceExt;

    pub(crate) const ACCESS_SECRET: &str = "test-access-secret";
    pub(crate) const REFRESH_SECRET: &str = "test-refresh-secret";

    pub(crate) fn test_state(rotation: RotationPolicy, access_ttl: i64) -> (AppState, Arc<InMemoryOtp>) {
        test_state_with_otp_ttl(rotation, access_ttl, 600)
    }

    fn test_state_with_otp_ttl(
        rotation: RotationPolicy,
        access_ttl: i64,
        otp_ttl: i64,
    ) -> (AppState, Arc<InMemoryOtp>) {
        let signing = SigningConfig::new(ACCESS_SECRET, REFRESH_SECRET)
            .unwrap()
            .with_access_options(TokenOptions::access().with_expires_in(access_ttl));
        let otp = Arc::new(InMemoryOtp::new(otp_ttl));
        let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        let state = AppState::new(
            TokenCodec::new(signing),
            Arc::new(UserStore::new()),
            otp.clone(),
            rotation,
            prometheus,
        );
        (state, otp)
    }

    fn app(state: AppState) -> Router {
        auth_routes().with_state(state)
    }

    async fn call(
        state: &AppState,
        method: &str,
        uri: &str,
        bearer: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Register and verify a user, returning the session body.
    pub(crate) async fn signed_up(state: &AppState, otp: &InMemoryOtp, email: &str) -> serde_json::Value {
        let (status, body) = call(
            state,
            "POST",
            "/auth/register",
            None,
            Some(serde_json::json!({"email": email, "password": "password123", "name": "Ada"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let otp_id = body["otpId"].as_str().unwrap().to_string();
        let code = otp.code_for(&otp_id).await.unwrap();

        let (status, session) = call(
            state,
            "POST",
            "/auth/verify-otp",
            None,
            Some(serde_json::json!({"otpId": otp_id, "code": code})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        session
    }

    #[tokio::test]
    async fn register_verify_and_me() {
        let (state, otp) = test_state(RotationPolicy::Reuse, 900);
        let session = signed_up(&state, &otp, "ada@example.com").await;
        assert_eq!(session["user"]["email"], "ada@example.com");
        assert_eq!(session["user"]["verified"], true);
        assert_eq!(session["tokens"]["expiresIn"], 900);

        let access = session["tokens"]["accessToken"].as_str().unwrap();
        let (status, me) = call(&state, "GET", "/auth/me", Some(access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["user"]["id"], session["user"]["id"]);
    }

    #[tokio::test]
    async fn unverified_login_is_forbidden() {
        let (state, _) = test_state(RotationPolicy::Reuse, 900);
        let (status, _) = call(
            &state,
            "POST",
            "/auth/register",
            None,
            Some(serde_json::json!({"email": "a@example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(
            &state,
            "POST",
            "/auth/login",
            None,
            Some(serde_json::json!({"email": "a@example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "account_unverified");
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_unauthorized_but_untyped() {
        let (state, otp) = test_state(RotationPolicy::Reuse, 900);
        signed_up(&state, &otp, "a@example.com").await;

        let (status, body) = call(
            &state,
            "POST",
            "/auth/login",
            None,
            Some(serde_json::json!({"email": "a@example.com", "password": "nope-nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "invalid_credentials");
    }

    #[tokio::test]
    async fn wrong_otp_code_rejected() {
        let (state, _) = test_state(RotationPolicy::Reuse, 900);
        let (_, body) = call(
            &state,
            "POST",
            "/auth/register",
            None,
            Some(serde_json::json!({"email": "a@example.com", "password": "password123"})),
        )
        .await;
        let (status, body) = call(
            &state,
            "POST",
            "/auth/verify-otp",
            None,
            Some(serde_json::json!({"otpId": body["otpId"], "code": "not-a-code"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "invalid_otp");
    }

    #[tokio::test]
    async fn me_without_token_is_missing_token() {
        let (state, _) = test_state(RotationPolicy::Reuse, 900);
        let (status, body) = call(&state, "GET", "/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "missing_token");
    }

    #[tokio::test]
    async fn expired_access_token_gets_sentinel() {
        let (state, otp) = test_state(RotationPolicy::Reuse, 900);
        let session = signed_up(&state, &otp, "a@example.com").await;
        let user_id = session["user"]["id"].as_str().unwrap();

        let expired = issue_token_at(
            user_id,
            ACCESS_SECRET,
            &TokenOptions::access().with_expires_in(-1),
            now_secs(),
        )
        .unwrap();
        let (status, body) = call(&state, "GET", "/auth/me", Some(&expired), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "token_expired");
    }

    #[tokio::test]
    async fn tampered_access_token_is_malformed() {
        let (state, otp) = test_state(RotationPolicy::Reuse, 900);
        let session = signed_up(&state, &otp, "a@example.com").await;
        let mut token = session["tokens"]["accessToken"].as_str().unwrap().to_string();
        token.push('x');

        let (status, body) = call(&state, "GET", "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "token_malformed");
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let (state, otp) = test_state(RotationPolicy::Reuse, 900);
        let session = signed_up(&state, &otp, "a@example.com").await;
        let refresh = session["tokens"]["refreshToken"].as_str().unwrap();

        let (status, body) = call(&state, "GET", "/auth/me", Some(refresh), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "token_malformed");
    }

    #[tokio::test]
    async fn reuse_policy_keeps_refresh_token() {
        let (state, otp) = test_state(RotationPolicy::Reuse, 900);
        let session = signed_up(&state, &otp, "a@example.com").await;
        let refresh = session["tokens"]["refreshToken"].as_str().unwrap();

        for _ in 0..2 {
            let (status, body) = call(
                &state,
                "POST",
                "/auth/refresh",
                None,
                Some(serde_json::json!({"refreshToken": refresh})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["tokens"]["refreshToken"], refresh);
            assert_eq!(body["user"]["email"], "a@example.com");
        }
    }

    #[tokio::test]
    async fn rotate_policy_supersedes_old_refresh_token() {
        let (state, otp) = test_state(RotationPolicy::Rotate, 900);
        let session = signed_up(&state, &otp, "a@example.com").await;
        let first = session["tokens"]["refreshToken"].as_str().unwrap().to_string();

        let (status, body) = call(
            &state,
            "POST",
            "/auth/refresh",
            None,
            Some(serde_json::json!({"refreshToken": first})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let second = body["tokens"]["refreshToken"].as_str().unwrap().to_string();
        assert_ne!(first, second);

        let (status, body) = call(
            &state,
            "POST",
            "/auth/refresh",
            None,
            Some(serde_json::json!({"refreshToken": first})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "session_revoked");
    }

    #[tokio::test]
    async fn concurrent_refreshes_with_one_token_rotate_once() {
        let (state, otp) = test_state(RotationPolicy::Rotate, 900);
        let session = signed_up(&state, &otp, "a@example.com").await;
        let refresh = session["tokens"]["refreshToken"].as_str().unwrap().to_string();

        let mut handles = vec![];
        for _ in 0..4 {
            let state = state.clone();
            let refresh = refresh.clone();
            handles.push(tokio::spawn(async move {
                call(
                    &state,
                    "POST",
                    "/auth/refresh",
                    None,
                    Some(serde_json::json!({"refreshToken": refresh})),
                )
                .await
            }));
        }
        let mut winners = vec![];
        for h in handles {
            let (status, body) = h.await.unwrap();
            if status == StatusCode::OK {
                winners.push(body["tokens"]["refreshToken"].as_str().unwrap().to_string());
            } else {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(body["error"]["code"], "session_revoked");
            }
        }
        assert_eq!(winners.len(), 1);

        // The winner's token is the one the server now accepts
        let (status, _) = call(
            &state,
            "POST",
            "/auth/refresh",
            None,
            Some(serde_json::json!({"refreshToken": winners[0]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn expired_otp_bindings_are_dropped() {
        let (state, _) = test_state_with_otp_ttl(RotationPolicy::Reuse, 900, 0);
        let (status, _) = call(
            &state,
            "POST",
            "/auth/register",
            None,
            Some(serde_json::json!({"email": "a@example.com", "password": "password123"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        for _ in 0..20 {
            let (status, body) = call(
                &state,
                "POST",
                "/auth/forgot-password",
                None,
                Some(serde_json::json!({"email": "a@example.com"})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            let (status, _) = call(
                &state,
                "POST",
                "/auth/reset-password",
                None,
                Some(serde_json::json!({
                    "otpId": body["otpId"],
                    "code": "000000",
                    "password": "new-password"
                })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        assert_eq!(state.pending_bindings().await, 0);
    }

    #[tokio::test]
    async fn refresh_with_garbage_is_malformed() {
        let (state, _) = test_state(RotationPolicy::Reuse, 900);
        let (status, body) = call(
            &state,
            "POST",
            "/auth/refresh",
            None,
            Some(serde_json::json!({"refreshToken": "garbage"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "token_malformed");
    }

    #[tokio::test]
    async fn forgot_password_unknown_email_is_404() {
        let (state, _) = test_state(RotationPolicy::Reuse, 900);
        let (status, body) = call(
            &state,
            "POST",
            "/auth/forgot-password",
            None,
            Some(serde_json::json!({"email": "ghost@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "user_not_found");
    }

    #[tokio::test]
    async fn password_reset_changes_password_and_revokes_under_rotate() {
        let (state, otp) = test_state(RotationPolicy::Rotate, 900);
        let session = signed_up(&state, &otp, "a@example.com").await;
        let refresh = session["tokens"]["refreshToken"].as_str().unwrap().to_string();

        let (status, body) = call(
            &state,
            "POST",
            "/auth/forgot-password",
            None,
            Some(serde_json::json!({"email": "a@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let otp_id = body["otpId"].as_str().unwrap().to_string();
        let code = otp.code_for(&otp_id).await.unwrap();

        // A reset ticket cannot be used to verify an email
        let (status, _) = call(
            &state,
            "POST",
            "/auth/verify-otp",
            None,
            Some(serde_json::json!({"otpId": otp_id, "code": code})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &state,
            "POST",
            "/auth/reset-password",
            None,
            Some(serde_json::json!({"otpId": otp_id, "code": code, "password": "new-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(
            &state,
            "POST",
            "/auth/refresh",
            None,
            Some(serde_json::json!({"refreshToken": refresh})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "session_revoked");

        let (status, _) = call(
            &state,
            "POST",
            "/auth/login",
            None,
            Some(serde_json::json!({"email": "a@example.com", "password": "new-password"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
