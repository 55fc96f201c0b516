use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use residence_data::models::{ContractRow, DirectMessageRow, Notification};
use residence_shared::types::{ChangeEvent, Table};

use crate::bridge::session::{PushFrame, SessionBridge};
use crate::realtime::{ChangeFilter, RealtimeListener, Subscription};

/// Independent feeds of system notifications for one tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Messages,
    Contracts,
    Notifications,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Messages, Source::Contracts, Source::Notifications];

    /// Parses `messages,contracts`; unknown names are ignored, an absent list means all.
    pub fn parse_list(raw: Option<&str>) -> Vec<Source> {
        let Some(raw) = raw else {
            return Source::ALL.to_vec();
        };
        raw.split(',')
            .filter_map(|name| match name.trim() {
                "messages" => Some(Source::Messages),
                "contracts" => Some(Source::Contracts),
                "notifications" => Some(Source::Notifications),
                _ => None,
            })
            .collect()
    }
}

/// Mounts one subscription per enabled source.
///
/// The notification inbox is always mounted so the in-app list stays live;
/// the `notifications` source only decides whether new rows also raise a
/// system notification.
pub fn mount_sources(
    listener: &RealtimeListener,
    user_id: Uuid,
    sources: &[Source],
    bridge: Arc<SessionBridge>,
) -> Vec<Subscription> {
    let mut subscriptions = Vec::with_capacity(3);

    let inbox_bridge = bridge.clone();
    let show_inbox = sources.contains(&Source::Notifications);
    subscriptions.push(listener.subscribe(
        ChangeFilter::inserts(Table::Notifications, "user_id", user_id),
        move |event| on_notification(&inbox_bridge, show_inbox, event),
    ));

    if sources.contains(&Source::Messages) {
        let bridge = bridge.clone();
        subscriptions.push(listener.subscribe(
            ChangeFilter::inserts(Table::DirectMessages, "receiver_id", user_id),
            move |event| on_direct_message(&bridge, event),
        ));
    }

    if sources.contains(&Source::Contracts) {
        let bridge = bridge.clone();
        subscriptions.push(listener.subscribe(
            ChangeFilter::updates(Table::Contracts, "user_id", user_id),
            move |event| on_contract_update(&bridge, event),
        ));
    }

    subscriptions
}

fn on_notification(bridge: &SessionBridge, show: bool, event: ChangeEvent) {
    let notification: Notification = match event.decode() {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable notification row");
            return;
        }
    };

    if show {
        let tag = format!("notification-{}", notification.id);
        bridge.show(&notification.title, &notification.message, Some(&tag));
    }
    bridge.platform().push(PushFrame::Notification(notification));
}

fn on_direct_message(bridge: &SessionBridge, event: ChangeEvent) {
    let message: DirectMessageRow = match event.decode() {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable direct message row");
            return;
        }
    };

    let title = match message.sender_username.as_deref() {
        Some(sender) => format!("New message from {sender}"),
        None => "New message".to_string(),
    };
    bridge.show(&title, &message.content, Some(&format!("dm-{}", message.id)));
}

fn on_contract_update(bridge: &SessionBridge, event: ChangeEvent) {
    let contract: ContractRow = match event.decode() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "undecodable contract row");
            return;
        }
    };
    if !contract.is_paid() {
        return;
    }
    // Without a previous image every update into "paid" counts as the transition.
    let was_paid = event
        .decode_old::<ContractRow>()
        .map(|old| old.is_paid())
        .unwrap_or(false);
    if was_paid {
        return;
    }

    bridge.show(
        "Contract paid",
        &format!("{} has been marked as paid", contract.title),
        Some(&format!("contract-{}", contract.id)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::permission::Permission;
    use crate::bridge::session::SessionPlatform;
    use chrono::Utc;
    use residence_data::ChangeFeed;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Harness {
        feed: ChangeFeed,
        rx: mpsc::UnboundedReceiver<PushFrame>,
        _subs: Vec<Subscription>,
    }

    fn mount(user: Uuid, sources: &[Source]) -> Harness {
        let feed = ChangeFeed::new();
        let listener = RealtimeListener::new(feed.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(SessionBridge::new(SessionPlatform::new(tx), Permission::Granted, false));
        let subs = mount_sources(&listener, user, sources, bridge);
        Harness { feed, rx, _subs: subs }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<PushFrame>) -> PushFrame {
        tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap()
    }

    fn contract(user_id: Uuid, status: &str) -> ContractRow {
        ContractRow {
            id: Uuid::nil(),
            user_id,
            title: "Guild hall lease".into(),
            status: status.into(),
            amount: Some(120.0),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn source_list_parsing() {
        assert_eq!(Source::parse_list(None), Source::ALL.to_vec());
        assert_eq!(Source::parse_list(Some("contracts, bogus")), vec![Source::Contracts]);
        assert!(Source::parse_list(Some("")).is_empty());
    }

    #[tokio::test]
    async fn direct_message_raises_system_notification() {
        let user = Uuid::new_v4();
        let mut h = mount(user, &[Source::Messages]);

        h.feed.emit(ChangeEvent::insert(
            Table::DirectMessages,
            &DirectMessageRow {
                id: Uuid::new_v4(),
                sender_id: Uuid::new_v4(),
                receiver_id: user,
                content: "meet at dusk".into(),
                sender_username: Some("carmilla".into()),
                created_at: Utc::now(),
            },
        ));

        match next(&mut h.rx).await {
            PushFrame::SystemNotification(notice) => {
                assert_eq!(notice.title, "New message from carmilla");
                assert_eq!(notice.body, "meet at dusk");
            }
            other => panic!("unexpected frame {}", other.name()),
        }
    }

    #[tokio::test]
    async fn contract_notifies_only_on_transition_into_paid() {
        let user = Uuid::new_v4();
        let mut h = mount(user, &[Source::Contracts]);

        let active = contract(user, "active");
        let paid = contract(user, ContractRow::PAID);
        h.feed.emit(ChangeEvent::update(Table::Contracts, Some(&paid), &paid));
        h.feed.emit(ChangeEvent::update(Table::Contracts, Some(&paid), &active));
        h.feed.emit(ChangeEvent::update(Table::Contracts, Some(&active), &paid));

        match next(&mut h.rx).await {
            PushFrame::SystemNotification(notice) => assert_eq!(notice.title, "Contract paid"),
            other => panic!("unexpected frame {}", other.name()),
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn inbox_streams_even_when_notification_source_is_off() {
        let user = Uuid::new_v4();
        let mut h = mount(user, &[]);

        let row = Notification {
            id: Uuid::new_v4(),
            user_id: user,
            title: "Welcome".into(),
            message: "Your application was accepted".into(),
            kind: "success".into(),
            is_read: false,
            created_at: Utc::now(),
        };
        h.feed.emit(ChangeEvent::insert(Table::Notifications, &row));

        match next(&mut h.rx).await {
            PushFrame::Notification(n) => assert_eq!(n.id, row.id),
            other => panic!("unexpected frame {}", other.name()),
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.rx.try_recv().is_err());
    }
}
