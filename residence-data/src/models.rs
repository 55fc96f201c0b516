use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use residence_shared::types::session::{role_or_guest, Role};

use crate::schema::{notifications, profiles, support_tickets, telegram_connections};

// --- Profile ---

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub role: String,
    pub custom_role_id: Option<Uuid>,
}

impl Profile {
    pub fn role(&self) -> Role {
        role_or_guest(&self.role)
    }
}

// --- Notification ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Default,
    Success,
    Warning,
    ContractPaid,
    Message,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::ContractPaid => "contract_paid",
            Self::Message => "message",
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: String,
}

impl NewNotification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            kind: kind.as_str().to_string(),
        }
    }
}

// --- Telegram connection ---

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = telegram_connections)]
pub struct TelegramConnection {
    pub id: Uuid,
    pub user_id: Uuid,
    pub connection_code: String,
    pub telegram_chat_id: Option<i64>,
    pub is_connected: bool,
    pub connected_at: Option<DateTime<Utc>>,
}

impl TelegramConnection {
    /// Chat id of a consumed, live link.
    pub fn linked_chat(&self) -> Option<i64> {
        if self.is_connected {
            self.telegram_chat_id
        } else {
            None
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = telegram_connections)]
pub struct NewTelegramConnection<'a> {
    pub user_id: Uuid,
    pub connection_code: &'a str,
    pub telegram_chat_id: Option<i64>,
    pub is_connected: bool,
    pub connected_at: Option<DateTime<Utc>>,
}

// --- Support ticket ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketKind {
    Support,
    Idea,
}

impl TicketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Support => "support",
            Self::Idea => "idea",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Answered,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Answered => "answered",
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = support_tickets)]
pub struct SupportTicket {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub telegram_chat_id: i64,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub admin_response: Option<String>,
    pub responded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = support_tickets)]
pub struct NewSupportTicket {
    pub user_id: Option<Uuid>,
    pub telegram_chat_id: i64,
    pub message: String,
    pub kind: String,
    pub status: String,
}

impl NewSupportTicket {
    pub fn open(user_id: Option<Uuid>, telegram_chat_id: i64, message: impl Into<String>, kind: TicketKind) -> Self {
        Self {
            user_id,
            telegram_chat_id,
            message: message.into(),
            kind: kind.as_str().to_string(),
            status: TicketStatus::Open.as_str().to_string(),
        }
    }
}

/// An open ticket joined with the submitter's username.
#[derive(Debug, Clone, Serialize)]
pub struct TicketWithSubmitter {
    #[serde(flatten)]
    pub ticket: SupportTicket,
    pub username: Option<String>,
}

// --- Row images from collaborators (change feed only) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectMessageRow {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub sender_username: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl ContractRow {
    pub const PAID: &'static str = "paid";

    pub fn is_paid(&self) -> bool {
        self.status == Self::PAID
    }
}
