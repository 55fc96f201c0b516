use futures_lite::StreamExt;

use residence_data::ChangeFeed;
use residence_shared::clients::rabbitmq::RabbitMQClient;
use residence_shared::types::{routing_keys, ChangeEvent, Event};

/// Re-emits row changes committed by other processes into the local feed.
///
/// The queue is exclusive to this process, so changes committed while it was
/// down are not replayed.
pub async fn listen_db_changes(rabbitmq: RabbitMQClient, feed: ChangeFeed) -> anyhow::Result<()> {
    let queue = format!("residence-notification.changes.{}", uuid::Uuid::new_v4().simple());
    let mut consumer = rabbitmq.subscribe(&queue, &[routing_keys::DB_ALL]).await?;

    tracing::info!("listening for database change events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => match decode_change(&delivery.data) {
                Ok(change) => {
                    tracing::debug!(
                        routing_key = %delivery.routing_key,
                        table = %change.table,
                        "relaying change into local feed"
                    );
                    feed.emit(change);
                }
                Err(e) => {
                    tracing::error!(error = %e, routing_key = %delivery.routing_key, "failed to deserialize change event");
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "change consumer error");
            }
        }
    }

    tracing::warn!("change consumer stream ended");
    Ok(())
}

fn decode_change(payload: &[u8]) -> serde_json::Result<ChangeEvent> {
    let event: Event<ChangeEvent> = serde_json::from_slice(payload)?;
    let mut change = event.data;
    change.relayed = true;
    Ok(change)
}
