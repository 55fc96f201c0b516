pub mod bridge;
pub mod config;
pub mod events;
pub mod realtime;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use residence_data::Store;
use residence_shared::clients::rabbitmq::RabbitMQClient;
use residence_shared::middleware::{metrics_middleware, JwtKeys, SessionKeys};

use crate::bridge::SessionRegistry;
use crate::config::AppConfig;
use crate::realtime::RealtimeListener;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub keys: JwtKeys,
    pub listener: RealtimeListener,
    pub sessions: SessionRegistry,
    pub rabbitmq: Option<RabbitMQClient>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        rabbitmq: Option<RabbitMQClient>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        let keys = JwtKeys::new(&config.jwt_secret);
        let listener = RealtimeListener::new(store.feed().clone());
        Self {
            config,
            store,
            keys,
            listener,
            sessions: SessionRegistry::new(),
            rabbitmq,
            metrics_handle,
        }
    }
}

impl SessionKeys for AppState {
    fn jwt_keys(&self) -> &JwtKeys {
        &self.keys
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    use routes::{health, notifications, push, session, telegram};

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/session", get(session::current))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/mark-all-read", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route("/push/stream", get(push::stream))
        .route("/push/sessions/:id/request", post(push::request_permission))
        .route("/push/sessions/:id/permission", post(push::report_permission))
        .route("/push/sessions/:id/focus", post(push::report_focus))
        .route("/telegram/connection", get(telegram::connection_status))
        .route(
            "/telegram/connection/code",
            get(telegram::copy_code).post(telegram::generate_code),
        )
        .route("/telegram/connection/events", get(telegram::connection_events))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use residence_data::{ChangeFeed, MemoryStore};
    use residence_shared::types::{Claims, Role};
    use tower::ServiceExt;
    use uuid::Uuid;

    pub fn state() -> (Arc<AppState>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(ChangeFeed::new()));
        let state = AppState::new(AppConfig::default(), store.clone(), None, None);
        (Arc::new(state), store)
    }

    pub fn bearer(state: &AppState, user_id: Uuid, role: Role) -> String {
        let token = state
            .keys
            .sign(&Claims::new(user_id, Some("tester".into()), role, 600))
            .unwrap();
        format!("Bearer {token}")
    }

    pub async fn send(
        state: &Arc<AppState>,
        method: &str,
        uri: &str,
        auth: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app(state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, value)
    }
}
