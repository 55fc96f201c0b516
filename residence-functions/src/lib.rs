pub mod config;
pub mod events;
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
use residence_shared::clients::telegram::TelegramClient;
use residence_shared::middleware::metrics_middleware;

use crate::config::AppConfig;

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub bot_secret: String,
    pub telegram: Option<TelegramClient>,
    pub rabbitmq: Option<RabbitMQClient>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Fails when no bot secret is configured.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        rabbitmq: Option<RabbitMQClient>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> anyhow::Result<Self> {
        let bot_secret = config.bot_secret()?.to_string();
        let telegram = config
            .telegram_bot_token()
            .map(|token| TelegramClient::new(&config.telegram_api_base, token));
        if telegram.is_none() {
            tracing::warn!("no telegram bot token configured, DM forwarding disabled");
        }

        Ok(Self {
            config,
            store,
            bot_secret,
            telegram,
            rabbitmq,
            metrics_handle,
        })
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    use routes::{dm_notification, health, telegram_bot};

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route(
            "/telegram-bot",
            post(telegram_bot::handle).options(routes::preflight),
        )
        .route(
            "/send-dm-notification",
            post(dm_notification::handle).options(routes::preflight),
        )
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
    use tower::ServiceExt;

    pub const BOT_SECRET: &str = "bot-secret-for-tests";

    pub fn state(telegram_api_base: Option<&str>) -> (Arc<AppState>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(ChangeFeed::new()));
        let mut config = AppConfig {
            bot_secret: Some(BOT_SECRET.into()),
            ..AppConfig::default()
        };
        if let Some(base) = telegram_api_base {
            config.telegram_bot_token = Some("token".into());
            config.telegram_api_base = base.into();
        }
        let state = AppState::new(config, store.clone(), None, None).unwrap();
        (Arc::new(state), store)
    }

    pub async fn post(
        state: &Arc<AppState>,
        uri: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let response = app(state.clone())
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }
}
