use std::sync::Arc;

use residence_data::{ChangeFeed, PgStore};
use residence_functions::config::AppConfig;
use residence_functions::{app, events, AppState};
use residence_shared::clients::db::create_pool;
use residence_shared::clients::rabbitmq::RabbitMQClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    residence_shared::middleware::init_tracing("residence-functions");

    let config = AppConfig::load()?;
    // Refuse to start without a bot secret, before touching any infrastructure.
    config.bot_secret()?;
    let port = config.port;

    let pool = create_pool(&config.database_url, config.db_pool_size)?;
    let feed = ChangeFeed::new();
    let store = Arc::new(PgStore::new(pool, feed.clone()));

    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
    let metrics_handle = residence_shared::middleware::init_metrics()?;

    // Notifications and connection changes made here reach browser sessions
    // through the notification service.
    tokio::spawn(events::publisher::relay_local_changes(rabbitmq.clone(), feed));

    let state = Arc::new(AppState::new(config, store, Some(rabbitmq), Some(metrics_handle))?);
    let app = app(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "residence-functions starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
