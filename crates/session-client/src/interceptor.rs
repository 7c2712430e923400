//! Authenticated request execution with transparent refresh
//!
//! Every request goes out with the stored access token. An expired-token
//! response parks the request on the refresh coordinator and re-issues it
//! exactly once with the new token. A second expiry, or any other typed auth
//! rejection, ends the session before the error is returned.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::classify::{AuthSignal, classify_response};
use crate::coordinator::RefreshCoordinator;
use crate::error::{Error, Result};
use crate::transport::{ApiRequest, ApiResponse, Transport};

pub struct Interceptor {
    transport: Arc<dyn Transport>,
    coordinator: RefreshCoordinator,
}

impl Interceptor {
    pub fn new(transport: Arc<dyn Transport>, coordinator: RefreshCoordinator) -> Self {
        Self {
            transport,
            coordinator,
        }
    }

    /// Send `request`, refreshing and retrying once on token expiry.
    ///
    /// Non-auth responses (including error statuses) and transport failures
    /// are returned unmodified and never touch the session.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let Some(mut token) = self
            .coordinator
            .store()
            .get()
            .await
            .access_token()
            .map(str::to_string)
        else {
            return Err(Error::NoSession);
        };
        let mut retried = false;

        loop {
            let response = self.transport.send(request, &token).await?;
            match classify_response(response.status, &response.body) {
                AuthSignal::Pass => return Ok(response),
                AuthSignal::Expired if !retried => {
                    debug!("access token expired, waiting for refresh");
                    let fresh = self.coordinator.await_valid_token(Some(&token)).await?;
                    token = fresh;
                    retried = true;
                }
                AuthSignal::Expired => {
                    warn!("access token still expired after refresh");
                    self.force_logout().await;
                    return Err(Error::SessionExpired(
                        "access token rejected as expired after refresh".into(),
                    ));
                }
                AuthSignal::Rejected(kind) => {
                    warn!(code = kind.code(), "access token rejected");
                    self.force_logout().await;
                    return Err(Error::Rejected(kind));
                }
                AuthSignal::Revoked => {
                    warn!("session revoked by server");
                    self.force_logout().await;
                    return Err(Error::SessionExpired("session revoked".into()));
                }
            }
        }
    }

    async fn force_logout(&self) {
        if let Err(e) = self.coordinator.logout().await {
            warn!(error = %e, "forced logout not persisted");
        }
    }
}
