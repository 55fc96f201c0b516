//! In-process fan-out of committed row changes.
//!
//! Stores emit one [`ChangeEvent`] per committed row; realtime listeners and
//! the RabbitMQ relay subscribe. Subscribers lagging by more than the
//! channel capacity skip events and are told how many were lost.

use tokio::sync::broadcast;

use residence_shared::types::ChangeEvent;

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(cap: usize) -> Self {
        let (tx, _) = broadcast::channel(cap);
        Self { tx }
    }

    /// Publish a change. Returns the number of receivers; zero is normal.
    pub fn emit(&self, event: ChangeEvent) -> usize {
        tracing::trace!(table = %event.table, kind = event.kind.as_str(), "change emitted");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
