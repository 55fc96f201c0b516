use std::sync::Arc;

use axum::extract::State;

use residence_shared::{HealthCheck, HealthResponse};

use crate::AppState;

/// Liveness plus database and broker probes.
pub async fn health_check(State(state): State<Arc<AppState>>) -> HealthResponse {
    let mut checks = vec![HealthCheck::from_result("database", state.store.ping())];
    if let Some(rabbitmq) = &state.rabbitmq {
        let result = if rabbitmq.is_connected() { Ok(()) } else { Err("channel closed") };
        checks.push(HealthCheck::from_result("rabbitmq", result));
    }

    HealthResponse::from_checks("residence-notification", env!("CARGO_PKG_VERSION"), checks)
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
