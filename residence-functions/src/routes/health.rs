use std::sync::Arc;

use axum::extract::State;

use residence_shared::{HealthCheck, HealthResponse};

use crate::AppState;

/// Database and broker probes. A missing bot token only degrades: DMs are
/// still stored, just not forwarded.
pub async fn health_check(State(state): State<Arc<AppState>>) -> HealthResponse {
    let mut checks = vec![HealthCheck::from_result("database", state.store.ping())];
    if let Some(rabbitmq) = &state.rabbitmq {
        let result = if rabbitmq.is_connected() { Ok(()) } else { Err("channel closed") };
        checks.push(HealthCheck::from_result("rabbitmq", result));
    }
    if state.telegram.is_none() {
        checks.push(HealthCheck::degraded("telegram", "bot token not configured"));
    }

    HealthResponse::from_checks("residence-functions", env!("CARGO_PKG_VERSION"), checks)
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
