//! Mutex-guarded in-memory [`Store`] with the same semantics as [`PgStore`].
//!
//! Backs the unit tests and local demos; rows live for the lifetime of the
//! value.
//!
//! [`PgStore`]: crate::store::pg::PgStore

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use residence_shared::errors::{AppError, AppResult, ErrorCode};
use residence_shared::types::{ChangeEvent, Table};

use crate::feed::ChangeFeed;
use crate::models::{
    NewNotification, NewSupportTicket, Notification, Profile, SupportTicket, TelegramConnection,
    TicketStatus, TicketWithSubmitter,
};
use crate::store::Store;

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    // Insertion order doubles as commit order.
    notifications: Vec<Notification>,
    connections: Vec<TelegramConnection>,
    tickets: Vec<SupportTicket>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            feed,
        }
    }

    /// Seeds a profile; profiles are owned by the auth provider, not this slice.
    pub fn insert_profile(&self, id: Uuid, username: &str, role: &str) -> AppResult<Profile> {
        let profile = Profile {
            id,
            username: username.to_string(),
            role: role.to_string(),
            custom_role_id: None,
        };
        self.tables()?.profiles.insert(id, profile.clone());
        Ok(profile)
    }

    /// Snapshot of every notification row, oldest first.
    pub fn all_notifications(&self) -> AppResult<Vec<Notification>> {
        Ok(self.tables()?.notifications.clone())
    }

    pub fn all_connections(&self) -> AppResult<Vec<TelegramConnection>> {
        Ok(self.tables()?.connections.clone())
    }

    fn tables(&self) -> AppResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AppError::internal("memory store lock poisoned"))
    }
}

impl Store for MemoryStore {
    fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn ping(&self) -> AppResult<()> {
        self.tables().map(|_| ())
    }

    fn insert_notification(&self, new: NewNotification) -> AppResult<Notification> {
        let notification = Notification {
            id: Uuid::now_v7(),
            user_id: new.user_id,
            title: new.title,
            message: new.message,
            kind: new.kind,
            is_read: false,
            created_at: Utc::now(),
        };
        self.tables()?.notifications.push(notification.clone());

        self.feed.emit(ChangeEvent::insert(Table::Notifications, &notification));
        Ok(notification)
    }

    fn list_notifications(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>> {
        let tables = self.tables()?;
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    fn count_unread(&self, user_id: Uuid) -> AppResult<i64> {
        let tables = self.tables()?;
        Ok(tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }

    fn recent_unread(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>> {
        let tables = self.tables()?;
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    fn mark_read(&self, ids: &[Uuid]) -> AppResult<usize> {
        let updated: Vec<Notification> = {
            let mut tables = self.tables()?;
            tables
                .notifications
                .iter_mut()
                .filter(|n| ids.contains(&n.id))
                .map(|n| {
                    n.is_read = true;
                    n.clone()
                })
                .collect()
        };

        for row in &updated {
            self.feed.emit(ChangeEvent::update(Table::Notifications, None, row));
        }
        Ok(updated.len())
    }

    fn mark_read_for_user(&self, id: Uuid, user_id: Uuid) -> AppResult<Notification> {
        let notification = {
            let mut tables = self.tables()?;
            let row = tables
                .notifications
                .iter_mut()
                .find(|n| n.id == id && n.user_id == user_id)
                .ok_or_else(|| AppError::new(ErrorCode::NotificationNotFound, "notification not found"))?;
            row.is_read = true;
            row.clone()
        };

        self.feed.emit(ChangeEvent::update(Table::Notifications, None, &notification));
        Ok(notification)
    }

    fn mark_all_read(&self, user_id: Uuid) -> AppResult<usize> {
        let updated: Vec<Notification> = {
            let mut tables = self.tables()?;
            tables
                .notifications
                .iter_mut()
                .filter(|n| n.user_id == user_id && !n.is_read)
                .map(|n| {
                    n.is_read = true;
                    n.clone()
                })
                .collect()
        };

        for row in &updated {
            self.feed.emit(ChangeEvent::update(Table::Notifications, None, row));
        }
        Ok(updated.len())
    }

    fn find_profile(&self, id: Uuid) -> AppResult<Option<Profile>> {
        Ok(self.tables()?.profiles.get(&id).cloned())
    }

    fn find_connection(&self, user_id: Uuid) -> AppResult<Option<TelegramConnection>> {
        Ok(self
            .tables()?
            .connections
            .iter()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    fn upsert_connection_code(&self, user_id: Uuid, code: &str) -> AppResult<TelegramConnection> {
        let (previous, connection) = {
            let mut tables = self.tables()?;
            match tables.connections.iter_mut().find(|c| c.user_id == user_id) {
                Some(row) => {
                    let old = row.clone();
                    row.connection_code = code.to_string();
                    row.telegram_chat_id = None;
                    row.is_connected = false;
                    row.connected_at = None;
                    (Some(old), row.clone())
                }
                None => {
                    let row = TelegramConnection {
                        id: Uuid::now_v7(),
                        user_id,
                        connection_code: code.to_string(),
                        telegram_chat_id: None,
                        is_connected: false,
                        connected_at: None,
                    };
                    tables.connections.push(row.clone());
                    (None, row)
                }
            }
        };

        let event = match previous {
            Some(ref old) => ChangeEvent::update(Table::TelegramConnections, Some(old), &connection),
            None => ChangeEvent::insert(Table::TelegramConnections, &connection),
        };
        self.feed.emit(event);
        Ok(connection)
    }

    fn consume_connection_code(&self, code: &str, chat_id: i64) -> AppResult<Option<TelegramConnection>> {
        let code = code.trim().to_uppercase();
        let linked = {
            let mut tables = self.tables()?;
            tables
                .connections
                .iter_mut()
                .filter(|c| c.connection_code == code && !c.is_connected)
                .min_by_key(|c| c.id)
                .map(|c| {
                    c.telegram_chat_id = Some(chat_id);
                    c.is_connected = true;
                    c.connected_at = Some(Utc::now());
                    c.clone()
                })
        };

        if let Some(ref row) = linked {
            self.feed.emit(ChangeEvent::update(Table::TelegramConnections, None, row));
        }
        Ok(linked)
    }

    fn find_linked_connection(&self, chat_id: i64) -> AppResult<Option<TelegramConnection>> {
        Ok(self
            .tables()?
            .connections
            .iter()
            .find(|c| c.is_connected && c.telegram_chat_id == Some(chat_id))
            .cloned())
    }

    fn insert_ticket(&self, new: NewSupportTicket) -> AppResult<SupportTicket> {
        let now = Utc::now();
        let ticket = SupportTicket {
            id: Uuid::now_v7(),
            user_id: new.user_id,
            telegram_chat_id: new.telegram_chat_id,
            message: new.message,
            kind: new.kind,
            status: new.status,
            admin_response: None,
            responded_by: None,
            created_at: now,
            updated_at: now,
        };
        self.tables()?.tickets.push(ticket.clone());

        self.feed.emit(ChangeEvent::insert(Table::SupportTickets, &ticket));
        Ok(ticket)
    }

    fn open_tickets(&self, limit: i64) -> AppResult<Vec<TicketWithSubmitter>> {
        let tables = self.tables()?;
        Ok(tables
            .tickets
            .iter()
            .rev()
            .filter(|t| t.status == TicketStatus::Open.as_str())
            .take(limit.max(0) as usize)
            .map(|t| TicketWithSubmitter {
                ticket: t.clone(),
                username: t
                    .user_id
                    .and_then(|id| tables.profiles.get(&id))
                    .map(|p| p.username.clone()),
            })
            .collect())
    }

    fn find_ticket(&self, id: Uuid) -> AppResult<Option<SupportTicket>> {
        Ok(self.tables()?.tickets.iter().find(|t| t.id == id).cloned())
    }

    fn answer_ticket(&self, id: Uuid, response: &str, responder: Uuid) -> AppResult<Option<SupportTicket>> {
        let ticket = {
            let mut tables = self.tables()?;
            tables.tickets.iter_mut().find(|t| t.id == id).map(|t| {
                t.admin_response = Some(response.to_string());
                t.responded_by = Some(responder);
                t.status = TicketStatus::Answered.as_str().to_string();
                t.updated_at = Utc::now();
                t.clone()
            })
        };

        if let Some(ref row) = ticket {
            self.feed.emit(ChangeEvent::update(Table::SupportTickets, None, row));
        }
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationKind, TicketKind};
    use residence_shared::types::ChangeKind;

    fn store() -> MemoryStore {
        MemoryStore::new(ChangeFeed::new())
    }

    #[test]
    fn regenerating_a_code_resets_the_link() {
        let store = store();
        let user = Uuid::new_v4();

        store.upsert_connection_code(user, "AAAA1111").unwrap();
        store.consume_connection_code("AAAA1111", 777).unwrap().unwrap();

        let fresh = store.upsert_connection_code(user, "BBBB2222").unwrap();
        assert!(!fresh.is_connected);
        assert_eq!(fresh.telegram_chat_id, None);
        assert_eq!(fresh.connected_at, None);
        assert_eq!(store.all_connections().unwrap().len(), 1);
    }

    #[test]
    fn a_code_is_consumed_once() {
        let store = store();
        let user = Uuid::new_v4();
        store.upsert_connection_code(user, "ABC12XYZ").unwrap();

        let linked = store.consume_connection_code("abc12xyz", 12345).unwrap().unwrap();
        assert!(linked.is_connected);
        assert_eq!(linked.linked_chat(), Some(12345));

        assert!(store.consume_connection_code("ABC12XYZ", 999).unwrap().is_none());
        assert_eq!(store.find_linked_connection(12345).unwrap().unwrap().user_id, user);
        assert!(store.find_linked_connection(999).unwrap().is_none());
    }

    #[test]
    fn consuming_leaves_other_rows_untouched() {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.upsert_connection_code(a, "AAAA1111").unwrap();
        store.upsert_connection_code(b, "BBBB2222").unwrap();

        store.consume_connection_code("AAAA1111", 1).unwrap().unwrap();

        let other = store.find_connection(b).unwrap().unwrap();
        assert!(!other.is_connected);
        assert_eq!(other.connection_code, "BBBB2222");
    }

    #[test]
    fn a_shared_code_links_a_single_account() {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.upsert_connection_code(a, "SAME0000").unwrap();
        store.upsert_connection_code(b, "SAME0000").unwrap();

        let first = store.consume_connection_code("SAME0000", 4242).unwrap().unwrap();
        let linked: Vec<_> = store
            .all_connections()
            .unwrap()
            .into_iter()
            .filter(|c| c.linked_chat() == Some(4242))
            .collect();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].user_id, first.user_id);

        let second = store.consume_connection_code("SAME0000", 5151).unwrap().unwrap();
        assert_ne!(second.user_id, first.user_id);
        assert!(store.consume_connection_code("SAME0000", 6262).unwrap().is_none());
    }

    #[test]
    fn mark_read_touches_exactly_the_given_ids() {
        let store = store();
        let user = Uuid::new_v4();
        let first = store
            .insert_notification(NewNotification::new(user, NotificationKind::Default, "a", "a"))
            .unwrap();
        let second = store
            .insert_notification(NewNotification::new(user, NotificationKind::Default, "b", "b"))
            .unwrap();

        assert_eq!(store.mark_read(&[first.id]).unwrap(), 1);
        assert_eq!(store.mark_read(&[first.id]).unwrap(), 1);

        let rows = store.all_notifications().unwrap();
        assert!(rows.iter().find(|n| n.id == first.id).unwrap().is_read);
        assert!(!rows.iter().find(|n| n.id == second.id).unwrap().is_read);
        assert_eq!(store.count_unread(user).unwrap(), 1);
    }

    #[test]
    fn foreign_notification_cannot_be_marked_by_owner_route() {
        let store = store();
        let owner = Uuid::new_v4();
        let row = store
            .insert_notification(NewNotification::new(owner, NotificationKind::Warning, "t", "m"))
            .unwrap();

        let err = store.mark_read_for_user(row.id, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotificationNotFound));
    }

    #[test]
    fn lists_are_newest_first_and_capped() {
        let store = store();
        let user = Uuid::new_v4();
        for i in 0..5 {
            store
                .insert_notification(NewNotification::new(user, NotificationKind::Default, format!("n{i}"), ""))
                .unwrap();
        }

        let items = store.list_notifications(user, 3).unwrap();
        let titles: Vec<_> = items.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["n4", "n3", "n2"]);
    }

    #[test]
    fn open_tickets_join_submitter_username() {
        let store = store();
        let user = Uuid::new_v4();
        store.insert_profile(user, "morwen", "member").unwrap();
        store
            .insert_ticket(NewSupportTicket::open(Some(user), 10, "help", TicketKind::Support))
            .unwrap();
        let anonymous = store
            .insert_ticket(NewSupportTicket::open(None, 11, "idea", TicketKind::Idea))
            .unwrap();
        store.answer_ticket(anonymous.id, "thanks", Uuid::new_v4()).unwrap();

        let open = store.open_tickets(20).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].username.as_deref(), Some("morwen"));
    }

    #[test]
    fn writes_are_echoed_on_the_feed() {
        let store = store();
        let mut rx = store.feed().subscribe();
        let user = Uuid::new_v4();

        store.upsert_connection_code(user, "AAAA1111").unwrap();
        store.upsert_connection_code(user, "BBBB2222").unwrap();

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.kind, ChangeKind::Insert);
        assert_eq!(second.kind, ChangeKind::Update);
        assert_eq!(second.old_record.unwrap()["connection_code"], "AAAA1111");
    }
}
