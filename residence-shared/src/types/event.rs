use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ event envelope wrapping every relayed change.
///
/// Routing key format: `residence.db.{table}.{kind}`
/// Example: `residence.db.notifications.insert`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Tables whose row changes travel over the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Notifications,
    TelegramConnections,
    SupportTickets,
    Contracts,
    DirectMessages,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Notifications => "notifications",
            Table::TelegramConnections => "telegram_connections",
            Table::SupportTickets => "support_tickets",
            Table::Contracts => "contracts",
            Table::DirectMessages => "direct_messages",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
        }
    }
}

/// A committed row change: the new row image and, for updates, the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_record: Option<serde_json::Value>,
    pub committed_at: DateTime<Utc>,
    /// Set on changes received from another process; those are never relayed again.
    #[serde(skip)]
    pub relayed: bool,
}

impl ChangeEvent {
    pub fn insert<T: Serialize>(table: Table, row: &T) -> Self {
        Self {
            table,
            kind: ChangeKind::Insert,
            record: serde_json::to_value(row).unwrap_or(serde_json::Value::Null),
            old_record: None,
            committed_at: Utc::now(),
            relayed: false,
        }
    }

    pub fn update<T: Serialize>(table: Table, old: Option<&T>, row: &T) -> Self {
        Self {
            table,
            kind: ChangeKind::Update,
            record: serde_json::to_value(row).unwrap_or(serde_json::Value::Null),
            old_record: old.and_then(|o| serde_json::to_value(o).ok()),
            committed_at: Utc::now(),
            relayed: false,
        }
    }

    pub fn routing_key(&self) -> String {
        format!("{}.{}.{}", routing_keys::DB_PREFIX, self.table, self.kind.as_str())
    }

    /// Reads a column of the new row image as a UUID.
    pub fn uuid_column(&self, column: &str) -> Option<Uuid> {
        self.record
            .get(column)
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.record)
    }

    /// Previous row image, for updates that carried one.
    pub fn decode_old<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.old_record.as_ref().and_then(|v| T::deserialize(v).ok())
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    pub const DB_PREFIX: &str = "residence.db";

    /// Binding pattern matching every relayed row change.
    pub const DB_ALL: &str = "residence.db.#";
}
