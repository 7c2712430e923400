//! Prometheus metrics exposition
//!
//! - `auth_tokens_issued_total` (counter): label `kind` (`access` / `refresh`)
//! - `auth_refresh_total` (counter): label `outcome`
//! - `auth_verify_failures_total` (counter): label `reason` (a token error code)

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

pub fn record_token_issued(kind: &'static str) {
    metrics::counter!("auth_tokens_issued_total", "kind" => kind).increment(1);
}

pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("auth_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_verify_failure(reason: &'static str) {
    metrics::counter!("auth_verify_failures_total", "reason" => reason).increment(1);
}
