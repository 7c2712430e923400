//! HTTP seams between the session layer and the backend
//!
//! `Transport` sends authenticated API calls; `RefreshClient` exchanges a
//! refresh token for a new session. Both are traits so the coordinator and
//! interceptor can be driven by in-memory fakes in tests. `HttpClient`
//! implements both over `reqwest`.

use std::future::Future;
use std::pin::Pin;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use session_token::{ErrorBody, RefreshRequest, SessionResponse};
use tracing::debug;

use crate::error::{Error, Result};

/// An outbound API call, independent of any token.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the client's base URL, e.g. `/auth/me`.
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// A fully-read response. Bodies are small JSON documents, so they are
/// buffered whole to allow classification before handing them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| Error::Network(format!("invalid response body: {e}")))
    }
}

/// Sends an API request with a bearer token.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>>;
}

/// Exchanges a refresh token for a new token pair and profile.
pub trait RefreshClient: Send + Sync {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SessionResponse>> + Send + 'a>>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOtpRequest<'a> {
    otp_id: &'a str,
    code: &'a str,
}

/// `reqwest`-backed client for the auth backend.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Network(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /auth/login`.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionResponse> {
        self.post_public("/auth/login", &LoginRequest { email, password })
            .await
    }

    /// `POST /auth/verify-otp`. Completes registration and starts a session.
    pub async fn verify_otp(&self, otp_id: &str, code: &str) -> Result<SessionResponse> {
        self.post_public("/auth/verify-otp", &VerifyOtpRequest { otp_id, code })
            .await
    }

    async fn post_public<B: Serialize>(&self, path: &str, body: &B) -> Result<SessionResponse> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("{path} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Refused {
                status: status.as_u16(),
                message: error_code(&body).unwrap_or(body),
            });
        }

        response
            .json::<SessionResponse>()
            .await
            .map_err(|e| Error::Network(format!("invalid {path} response: {e}")))
    }
}

impl Transport for HttpClient {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
        access_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method.clone(), self.url(&request.path))
                .bearer_auth(access_token);
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Error::Network(format!("{} {} failed: {e}", request.method, request.path)))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| Error::Network(format!("reading response body: {e}")))?;

            debug!(method = %request.method, path = %request.path, status, "api response");
            Ok(ApiResponse { status, body })
        })
    }
}

impl RefreshClient for HttpClient {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SessionResponse>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url("/auth/refresh"))
                .json(&RefreshRequest {
                    refresh_token: refresh_token.to_string(),
                })
                .send()
                .await
                .map_err(|e| Error::Network(format!("token refresh request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| String::from("<no body>"));
                let reason = error_code(&body).unwrap_or(body);
                return Err(Error::SessionExpired(format!(
                    "refresh rejected ({status}): {reason}"
                )));
            }

            response
                .json::<SessionResponse>()
                .await
                .map_err(|e| Error::SessionExpired(format!("invalid refresh response: {e}")))
        })
    }
}

/// The typed `error.code` of a JSON error body, if it has one.
fn error_code(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use session_token::{TokenPair, UserProfile};
    use tokio::net::TcpListener;

    fn session(access: &str) -> SessionResponse {
        SessionResponse {
            tokens: TokenPair {
                access_token: access.into(),
                refresh_token: "rt_next".into(),
                expires_in: 900,
            },
            user: UserProfile {
                id: "u1".into(),
                email: "u1@example.com".into(),
                name: None,
                verified: true,
            },
        }
    }

    async fn start_backend() -> String {
        async fn refresh(Json(req): Json<RefreshRequest>) -> axum::response::Response {
            if req.refresh_token == "rt_good" {
                Json(session("at_fresh")).into_response()
            } else {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorBody::new("token_expired", "refresh token expired")),
                )
                    .into_response()
            }
        }

        async fn echo_auth(headers: HeaderMap) -> String {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        }

        let app = axum::Router::new()
            .route("/auth/refresh", post(refresh))
            .route("/echo", get(echo_auth));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = HttpClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.url("/auth/me"), "http://localhost:8080/auth/me");
    }

    #[test]
    fn error_code_reads_typed_bodies_only() {
        assert_eq!(
            error_code(r#"{"error":{"code":"session_revoked","message":"x"}}"#).as_deref(),
            Some("session_revoked")
        );
        assert_eq!(error_code("Unauthorized"), None);
    }

    #[tokio::test]
    async fn send_attaches_bearer_token() {
        let client = HttpClient::new(start_backend().await).unwrap();
        let response = client
            .send(&ApiRequest::get("/echo"), "at_current")
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "Bearer at_current");
    }

    #[tokio::test]
    async fn refresh_success_parses_session() {
        let client = HttpClient::new(start_backend().await).unwrap();
        let session = client.refresh("rt_good").await.unwrap();
        assert_eq!(session.tokens.access_token, "at_fresh");
        assert_eq!(session.tokens.refresh_token, "rt_next");
        assert_eq!(session.user.id, "u1");
    }

    #[tokio::test]
    async fn refresh_rejection_is_session_expired() {
        let client = HttpClient::new(start_backend().await).unwrap();
        let err = client.refresh("rt_stale").await.unwrap_err();
        match err {
            Error::SessionExpired(reason) => assert!(reason.contains("token_expired")),
            other => panic!("expected SessionExpired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new(format!("http://{addr}")).unwrap();
        let err = client
            .send(&ApiRequest::get("/echo"), "at")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
