//! Row-filtered subscriptions over the local change feed.
//!
//! Each [`Subscription`] owns one named channel and one task reading the
//! feed. Dropping the handle aborts the task and releases the channel name, so
//! a browser tab that goes away can never leave a listener behind.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use residence_data::ChangeFeed;
use residence_shared::types::{ChangeEvent, ChangeKind, Table};

/// "`kind` events on `table` where `column` = `value`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub kind: ChangeKind,
    pub column: &'static str,
    pub value: Uuid,
}

impl ChangeFilter {
    pub fn inserts(table: Table, column: &'static str, value: Uuid) -> Self {
        Self { table, kind: ChangeKind::Insert, column, value }
    }

    pub fn updates(table: Table, column: &'static str, value: Uuid) -> Self {
        Self { table, kind: ChangeKind::Update, column, value }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table
            && event.kind == self.kind
            && event.uuid_column(self.column) == Some(self.value)
    }

    fn channel_name(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}:{}:{}={}:{}",
            self.table,
            self.kind.as_str(),
            self.column,
            self.value,
            &suffix[..8]
        )
    }
}

#[derive(Clone)]
pub struct RealtimeListener {
    feed: ChangeFeed,
    channels: Arc<DashMap<String, ChangeFilter>>,
}

impl RealtimeListener {
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            feed,
            channels: Arc::new(DashMap::new()),
        }
    }

    /// Invokes `handler` once per change matching `filter`, with no ordering
    /// guarantee relative to commit order. Must be called inside a Tokio runtime.
    pub fn subscribe<F>(&self, filter: ChangeFilter, handler: F) -> Subscription
    where
        F: Fn(ChangeEvent) + Send + 'static,
    {
        let channel = filter.channel_name();
        // Receiver is taken before spawning so nothing committed after this call is missed.
        let mut rx = self.feed.subscribe();
        self.channels.insert(channel.clone(), filter.clone());

        let task_channel = channel.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if filter.matches(&event) => handler(event),
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(channel = %task_channel, missed, "realtime channel lagged, changes lost");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        tracing::debug!(channel = %channel, "realtime channel subscribed");
        Subscription {
            channel,
            task,
            channels: self.channels.clone(),
        }
    }

    /// Names of every channel currently mounted.
    pub fn active_channels(&self) -> Vec<String> {
        self.channels.iter().map(|entry| entry.key().clone()).collect()
    }
}

/// Live subscription handle; releases its channel when dropped.
pub struct Subscription {
    channel: String,
    task: JoinHandle<()>,
    channels: Arc<DashMap<String, ChangeFilter>>,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        if self.channels.remove(&self.channel).is_some() {
            tracing::debug!(channel = %self.channel, "realtime channel released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(serde::Serialize)]
    struct Row {
        id: Uuid,
        user_id: Uuid,
    }

    fn row_for(user_id: Uuid) -> Row {
        Row { id: Uuid::new_v4(), user_id }
    }

    #[tokio::test]
    async fn delivers_only_matching_rows() {
        let feed = ChangeFeed::new();
        let listener = RealtimeListener::new(feed.clone());
        let me = Uuid::new_v4();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = listener.subscribe(ChangeFilter::inserts(Table::Notifications, "user_id", me), move |event| {
            let _ = tx.send(event);
        });

        feed.emit(ChangeEvent::insert(Table::Notifications, &row_for(Uuid::new_v4())));
        feed.emit(ChangeEvent::insert(Table::SupportTickets, &row_for(me)));
        let other = row_for(me);
        feed.emit(ChangeEvent::update(Table::Notifications, None, &other));
        let mine = row_for(me);
        feed.emit(ChangeEvent::insert(Table::Notifications, &mine));

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(got.uuid_column("id"), Some(mine.id));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn repeated_mounts_get_distinct_channels() {
        let listener = RealtimeListener::new(ChangeFeed::new());
        let user = Uuid::new_v4();
        let filter = ChangeFilter::inserts(Table::DirectMessages, "receiver_id", user);

        let first = listener.subscribe(filter.clone(), |_| {});
        let second = listener.subscribe(filter, |_| {});

        assert_ne!(first.channel(), second.channel());
        assert_eq!(listener.active_channels().len(), 2);
    }

    #[tokio::test]
    async fn dropping_or_unsubscribing_releases_the_channel() {
        let feed = ChangeFeed::new();
        let listener = RealtimeListener::new(feed.clone());
        let user = Uuid::new_v4();

        let kept = listener.subscribe(ChangeFilter::updates(Table::Contracts, "user_id", user), |_| {});
        {
            let _scoped = listener.subscribe(ChangeFilter::inserts(Table::Notifications, "user_id", user), |_| {});
            assert_eq!(listener.active_channels().len(), 2);
        }
        assert_eq!(listener.active_channels(), vec![kept.channel().to_string()]);

        kept.unsubscribe();
        assert!(listener.active_channels().is_empty());

        // Aborted tasks drop their receivers.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(feed.receiver_count(), 0);
    }
}
