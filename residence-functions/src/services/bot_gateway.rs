//! Command dispatcher behind `POST /telegram-bot`.
//!
//! Stateless: the caller is resolved on every request from the Telegram chat
//! id through its linked connection row. Domain refusals (bad code, missing
//! ticket, non-developer) are replies with `success: false`, not errors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use residence_data::models::{
    NewNotification, NewSupportTicket, Notification, NotificationKind, Profile, TicketKind,
    TicketWithSubmitter,
};
use residence_data::Store;
use residence_shared::errors::{AppError, AppResult, ErrorCode};
use residence_shared::middleware::record_notification_created;
use residence_shared::types::Capability;

pub const RECENT_UNREAD_LIMIT: i64 = 10;
pub const OPEN_TICKETS_LIMIT: i64 = 20;

pub const ACTIONS: [&str; 7] = [
    "connect",
    "support",
    "get_notifications",
    "mark_read",
    "get_support_tickets",
    "respond_ticket",
    "check_connection",
];

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BotCommand {
    Connect {
        code: String,
        chat_id: i64,
    },
    Support {
        chat_id: i64,
        message: String,
        #[serde(rename = "type", default = "default_ticket_kind")]
        kind: TicketKind,
    },
    GetNotifications {
        chat_id: i64,
    },
    MarkRead {
        notification_ids: Vec<Uuid>,
    },
    GetSupportTickets {
        chat_id: i64,
    },
    RespondTicket {
        chat_id: i64,
        ticket_id: Uuid,
        response_message: String,
    },
    CheckConnection {
        chat_id: i64,
    },
}

fn default_ticket_kind() -> TicketKind {
    TicketKind::Support
}

impl BotCommand {
    /// Parses `{action, ...params}`; unknown actions and malformed params are both 400s
    /// with distinct codes.
    pub fn parse(body: serde_json::Value) -> AppResult<Self> {
        let action = body
            .get("action")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| AppError::bad_request("missing action"))?;

        if !ACTIONS.contains(&action) {
            return Err(AppError::new(ErrorCode::UnknownBotAction, format!("unknown action: {action}")));
        }
        let action = action.to_string();

        serde_json::from_value(body)
            .map_err(|e| AppError::bad_request(format!("invalid parameters for {action}: {e}")))
    }

    pub fn action(&self) -> &'static str {
        match self {
            BotCommand::Connect { .. } => "connect",
            BotCommand::Support { .. } => "support",
            BotCommand::GetNotifications { .. } => "get_notifications",
            BotCommand::MarkRead { .. } => "mark_read",
            BotCommand::GetSupportTickets { .. } => "get_support_tickets",
            BotCommand::RespondTicket { .. } => "respond_ticket",
            BotCommand::CheckConnection { .. } => "check_connection",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BotReply {
    Message {
        success: bool,
        message: String,
    },
    Ack {
        success: bool,
    },
    Notifications {
        success: bool,
        notifications: Vec<Notification>,
    },
    Tickets {
        success: bool,
        tickets: Vec<TicketWithSubmitter>,
    },
    Answered {
        success: bool,
        chat_id: i64,
    },
    Connection {
        success: bool,
        connected: bool,
        username: Option<String>,
        is_developer: bool,
    },
}

impl BotReply {
    fn ok(message: impl Into<String>) -> Self {
        BotReply::Message { success: true, message: message.into() }
    }

    fn refused(message: impl Into<String>) -> Self {
        BotReply::Message { success: false, message: message.into() }
    }
}

pub fn dispatch(store: &dyn Store, command: BotCommand) -> AppResult<BotReply> {
    match command {
        BotCommand::Connect { code, chat_id } => connect(store, &code, chat_id),
        BotCommand::Support { chat_id, message, kind } => support(store, chat_id, message, kind),
        BotCommand::GetNotifications { chat_id } => get_notifications(store, chat_id),
        BotCommand::MarkRead { notification_ids } => {
            let updated = store.mark_read(&notification_ids)?;
            tracing::debug!(requested = notification_ids.len(), updated, "notifications marked read from telegram");
            Ok(BotReply::Ack { success: true })
        }
        BotCommand::GetSupportTickets { chat_id } => get_support_tickets(store, chat_id),
        BotCommand::RespondTicket { chat_id, ticket_id, response_message } => {
            respond_ticket(store, chat_id, ticket_id, &response_message)
        }
        BotCommand::CheckConnection { chat_id } => check_connection(store, chat_id),
    }
}

fn linked_profile(store: &dyn Store, chat_id: i64) -> AppResult<Option<Profile>> {
    match store.find_linked_connection(chat_id)? {
        Some(connection) => store.find_profile(connection.user_id),
        None => Ok(None),
    }
}

/// The linked developer for `chat_id`, or the refusal to send back.
fn linked_developer(store: &dyn Store, chat_id: i64) -> AppResult<Result<Profile, BotReply>> {
    Ok(match linked_profile(store, chat_id)? {
        Some(profile) if profile.role().can(Capability::SupportDesk) => Ok(profile),
        Some(_) => Err(BotReply::refused("Only developers can manage support tickets.")),
        None => Err(BotReply::refused("This chat is not linked to a Blood Residence account.")),
    })
}

fn connect(store: &dyn Store, code: &str, chat_id: i64) -> AppResult<BotReply> {
    let Some(connection) = store.consume_connection_code(code, chat_id)? else {
        tracing::info!(chat_id, "telegram connect rejected: invalid or used code");
        return Ok(BotReply::refused(
            "Invalid or already used code. Generate a new one on the website.",
        ));
    };

    let username = store
        .find_profile(connection.user_id)?
        .map(|p| p.username)
        .unwrap_or_else(|| "member".to_string());

    store.insert_notification(NewNotification::new(
        connection.user_id,
        NotificationKind::Success,
        "Telegram connected",
        "Your Telegram account is now linked. Notifications will be forwarded to it.",
    ))?;
    record_notification_created(NotificationKind::Success.as_str());

    tracing::info!(user_id = %connection.user_id, chat_id, "telegram chat linked");
    Ok(BotReply::ok(format!(
        "Welcome, {username}! Your Telegram is now connected to Blood Residence."
    )))
}

fn support(store: &dyn Store, chat_id: i64, message: String, kind: TicketKind) -> AppResult<BotReply> {
    let user_id = store.find_linked_connection(chat_id)?.map(|c| c.user_id);
    let ticket = store.insert_ticket(NewSupportTicket::open(user_id, chat_id, message, kind))?;

    tracing::info!(ticket_id = %ticket.id, chat_id, kind = kind.as_str(), "support ticket opened");
    Ok(BotReply::ok(match kind {
        TicketKind::Support => "Your support request has been received. A developer will answer here soon.",
        TicketKind::Idea => "Thank you for your idea! The team will review it.",
    }))
}

fn get_notifications(store: &dyn Store, chat_id: i64) -> AppResult<BotReply> {
    let notifications = match store.find_linked_connection(chat_id)? {
        Some(connection) => store.recent_unread(connection.user_id, RECENT_UNREAD_LIMIT)?,
        None => Vec::new(),
    };
    Ok(BotReply::Notifications { success: true, notifications })
}

fn get_support_tickets(store: &dyn Store, chat_id: i64) -> AppResult<BotReply> {
    if let Err(refusal) = linked_developer(store, chat_id)? {
        return Ok(refusal);
    }
    let tickets = store.open_tickets(OPEN_TICKETS_LIMIT)?;
    Ok(BotReply::Tickets { success: true, tickets })
}

fn respond_ticket(store: &dyn Store, chat_id: i64, ticket_id: Uuid, response: &str) -> AppResult<BotReply> {
    let developer = match linked_developer(store, chat_id)? {
        Ok(profile) => profile,
        Err(refusal) => return Ok(refusal),
    };

    let Some(ticket) = store.answer_ticket(ticket_id, response, developer.id)? else {
        return Ok(BotReply::refused("Ticket not found."));
    };

    tracing::info!(ticket_id = %ticket.id, responder = %developer.id, "support ticket answered");
    Ok(BotReply::Answered { success: true, chat_id: ticket.telegram_chat_id })
}

fn check_connection(store: &dyn Store, chat_id: i64) -> AppResult<BotReply> {
    Ok(match linked_profile(store, chat_id)? {
        Some(profile) => BotReply::Connection {
            success: true,
            connected: true,
            is_developer: profile.role().can(Capability::SupportDesk),
            username: Some(profile.username),
        },
        None => BotReply::Connection {
            success: true,
            connected: false,
            username: None,
            is_developer: false,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use residence_data::{ChangeFeed, MemoryStore};
    use serde_json::json;

    fn reply_json(reply: BotReply) -> serde_json::Value {
        serde_json::to_value(reply).unwrap()
    }

    fn run(store: &MemoryStore, body: serde_json::Value) -> serde_json::Value {
        reply_json(dispatch(store, BotCommand::parse(body).unwrap()).unwrap())
    }

    fn linked_user(store: &MemoryStore, username: &str, role: &str, chat_id: i64) -> Uuid {
        let user = Uuid::new_v4();
        store.insert_profile(user, username, role).unwrap();
        let code = format!("{:08}", chat_id % 100_000_000);
        store.upsert_connection_code(user, &code).unwrap();
        store.consume_connection_code(&code, chat_id).unwrap().unwrap();
        user
    }

    #[test]
    fn parse_distinguishes_unknown_action_from_bad_params() {
        let err = BotCommand::parse(json!({ "action": "drop_tables" })).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::UnknownBotAction));

        let err = BotCommand::parse(json!({ "action": "connect", "code": "ABC" })).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BadRequest));

        let err = BotCommand::parse(json!({ "code": "ABC" })).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BadRequest));
    }

    #[test]
    fn connect_is_case_insensitive_and_single_use() {
        let store = MemoryStore::new(ChangeFeed::new());
        let user = Uuid::new_v4();
        store.insert_profile(user, "elisabeth", "member").unwrap();
        store.upsert_connection_code(user, "ABC12XYZ").unwrap();

        let reply = run(&store, json!({ "action": "connect", "code": "abc12xyz", "chat_id": 12345 }));
        assert_eq!(reply["success"], true);
        assert!(reply["message"].as_str().unwrap().contains("elisabeth"));

        let connection = store.find_connection(user).unwrap().unwrap();
        assert!(connection.is_connected);
        assert_eq!(connection.telegram_chat_id, Some(12345));

        let notifications = store.all_notifications().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, "success");

        let reply = run(&store, json!({ "action": "connect", "code": "ABC12XYZ", "chat_id": 999 }));
        assert_eq!(reply["success"], false);
        assert_eq!(store.all_notifications().unwrap().len(), 1);
    }

    #[test]
    fn connect_flips_only_the_matching_row() {
        let store = MemoryStore::new(ChangeFeed::new());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.upsert_connection_code(a, "AAAAAAAA").unwrap();
        store.upsert_connection_code(b, "BBBBBBBB").unwrap();

        run(&store, json!({ "action": "connect", "code": "aaaaaaaa", "chat_id": 1 }));

        assert!(store.find_connection(a).unwrap().unwrap().is_connected);
        assert!(!store.find_connection(b).unwrap().unwrap().is_connected);
    }

    #[test]
    fn support_tickets_accept_unlinked_chats() {
        let store = MemoryStore::new(ChangeFeed::new());
        let reply = run(&store, json!({ "action": "support", "chat_id": 77, "message": "idea!", "type": "idea" }));
        assert_eq!(reply["success"], true);
        assert!(reply["message"].as_str().unwrap().contains("idea"));

        let open = store.open_tickets(20).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].ticket.user_id, None);
        assert_eq!(open[0].ticket.kind, "idea");
    }

    #[test]
    fn ticket_desk_refuses_non_developers() {
        let store = MemoryStore::new(ChangeFeed::new());
        linked_user(&store, "admin-anna", "admin", 10);
        let ticket = store
            .insert_ticket(NewSupportTicket::open(None, 55, "broken", TicketKind::Support))
            .unwrap();

        let reply = run(&store, json!({ "action": "get_support_tickets", "chat_id": 10 }));
        assert_eq!(reply["success"], false);

        let reply = run(&store, json!({
            "action": "respond_ticket",
            "chat_id": 10,
            "ticket_id": ticket.id,
            "response_message": "fixed"
        }));
        assert_eq!(reply["success"], false);
        assert_eq!(store.find_ticket(ticket.id).unwrap().unwrap().status, "open");

        let reply = run(&store, json!({ "action": "get_support_tickets", "chat_id": 404 }));
        assert_eq!(reply["success"], false);
    }

    #[test]
    fn developer_answers_a_ticket() {
        let store = MemoryStore::new(ChangeFeed::new());
        let dev = linked_user(&store, "dev-dracul", "developer", 20);
        let ticket = store
            .insert_ticket(NewSupportTicket::open(None, 55, "broken", TicketKind::Support))
            .unwrap();

        let reply = run(&store, json!({ "action": "get_support_tickets", "chat_id": 20 }));
        assert_eq!(reply["tickets"].as_array().unwrap().len(), 1);

        let reply = run(&store, json!({
            "action": "respond_ticket",
            "chat_id": 20,
            "ticket_id": ticket.id,
            "response_message": "fixed"
        }));
        assert_eq!(reply, json!({ "success": true, "chat_id": 55 }));

        let answered = store.find_ticket(ticket.id).unwrap().unwrap();
        assert_eq!(answered.status, "answered");
        assert_eq!(answered.responded_by, Some(dev));
        assert_eq!(answered.admin_response.as_deref(), Some("fixed"));

        let reply = run(&store, json!({
            "action": "respond_ticket",
            "chat_id": 20,
            "ticket_id": Uuid::new_v4(),
            "response_message": "?"
        }));
        assert_eq!(reply["success"], false);
    }

    #[test]
    fn notifications_and_mark_read_for_linked_chat() {
        let store = MemoryStore::new(ChangeFeed::new());
        let user = linked_user(&store, "mina", "member", 30);
        let mut ids = Vec::new();
        for i in 0..12 {
            let n = store
                .insert_notification(NewNotification::new(user, NotificationKind::Default, format!("#{i}"), ""))
                .unwrap();
            ids.push(n.id);
        }

        let reply = run(&store, json!({ "action": "get_notifications", "chat_id": 30 }));
        let listed = reply["notifications"].as_array().unwrap();
        assert_eq!(listed.len(), 10);
        assert_eq!(listed[0]["title"], "#11");

        let reply = run(&store, json!({ "action": "mark_read", "notification_ids": [ids[11], ids[10]] }));
        assert_eq!(reply, json!({ "success": true }));
        assert_eq!(store.count_unread(user).unwrap(), 10);

        let reply = run(&store, json!({ "action": "get_notifications", "chat_id": 31 }));
        assert_eq!(reply["notifications"], json!([]));
    }

    #[test]
    fn check_connection_reports_role() {
        let store = MemoryStore::new(ChangeFeed::new());
        linked_user(&store, "dev-dracul", "developer", 40);

        let reply = run(&store, json!({ "action": "check_connection", "chat_id": 40 }));
        assert_eq!(reply["connected"], true);
        assert_eq!(reply["username"], "dev-dracul");
        assert_eq!(reply["is_developer"], true);

        let reply = run(&store, json!({ "action": "check_connection", "chat_id": 41 }));
        assert_eq!(reply["connected"], false);
        assert_eq!(reply["is_developer"], false);
    }
}
