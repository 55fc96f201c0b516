use tokio::sync::broadcast::error::RecvError;

use residence_data::ChangeFeed;
use residence_shared::clients::rabbitmq::RabbitMQClient;
use residence_shared::types::{ChangeEvent, Event};

pub const SOURCE: &str = "residence-functions";

/// Publishes every locally committed change on `residence.db.{table}.{kind}`.
/// Changes that arrived from another process are skipped.
pub async fn relay_local_changes(rabbitmq: RabbitMQClient, feed: ChangeFeed) {
    let mut rx = feed.subscribe();
    tracing::info!("relaying local changes to RabbitMQ");

    loop {
        match rx.recv().await {
            Ok(change) if change.relayed => {}
            Ok(change) => publish(&rabbitmq, change).await,
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "change relay lagged, changes not published");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn publish(rabbitmq: &RabbitMQClient, change: ChangeEvent) {
    let routing_key = change.routing_key();
    let event = Event::new(SOURCE, routing_key.clone(), change);

    if let Err(e) = rabbitmq.publish(&routing_key, &event).await {
        tracing::error!(error = %e, routing_key = %routing_key, "failed to publish change event");
    }
}
