use std::sync::Arc;

use residence_data::{ChangeFeed, PgStore};
use residence_notification::config::AppConfig;
use residence_notification::{app, events, AppState};
use residence_shared::clients::db::create_pool;
use residence_shared::clients::rabbitmq::RabbitMQClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    residence_shared::middleware::init_tracing("residence-notification");

    let config = AppConfig::load()?;
    let port = config.port;

    let pool = create_pool(&config.database_url, config.db_pool_size)?;
    let feed = ChangeFeed::new();
    let store = Arc::new(PgStore::new(pool, feed.clone()));

    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
    let metrics_handle = residence_shared::middleware::init_metrics()?;

    // Changes committed by the bot gateway and other writers.
    let relay_client = rabbitmq.clone();
    tokio::spawn(async move {
        if let Err(e) = events::subscriber::listen_db_changes(relay_client, feed).await {
            tracing::error!(error = %e, "database change subscriber failed");
        }
    });

    let state = Arc::new(AppState::new(config, store, Some(rabbitmq), Some(metrics_handle)));
    let app = app(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "residence-notification starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
