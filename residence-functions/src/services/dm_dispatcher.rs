use uuid::Uuid;

use residence_data::models::{NewNotification, Notification, NotificationKind};
use residence_data::Store;
use residence_shared::clients::telegram::TelegramClient;
use residence_shared::errors::AppResult;
use residence_shared::middleware::{record_notification_created, record_telegram_delivery};

/// Preview length kept on the in-app notification.
pub const STORED_PREVIEW_CHARS: usize = 50;
/// Preview length forwarded to Telegram.
pub const FORWARDED_PREVIEW_CHARS: usize = 200;

/// Cuts `text` to `max` characters, appending `...` when anything was cut.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn telegram_text(sender_username: &str, preview: &str) -> String {
    format!(
        "💬 <b>New message from {}</b>\n\n{}",
        escape_html(sender_username),
        escape_html(&truncate(preview, FORWARDED_PREVIEW_CHARS))
    )
}

/// Stores the in-app notification, then forwards it to the receiver's linked
/// Telegram chat when there is one. Forwarding is best effort.
pub async fn dispatch(
    store: &dyn Store,
    telegram: Option<&TelegramClient>,
    receiver_id: Uuid,
    sender_username: &str,
    message_preview: &str,
) -> AppResult<Notification> {
    let notification = store.insert_notification(NewNotification::new(
        receiver_id,
        NotificationKind::Message,
        format!("New message from {sender_username}"),
        truncate(message_preview, STORED_PREVIEW_CHARS),
    ))?;
    record_notification_created(NotificationKind::Message.as_str());

    let Some(telegram) = telegram else {
        return Ok(notification);
    };

    let chat_id = match store.find_connection(receiver_id) {
        Ok(connection) => connection.and_then(|c| c.linked_chat()),
        Err(e) => {
            tracing::warn!(error = %e, receiver_id = %receiver_id, "could not look up telegram link");
            None
        }
    };
    let Some(chat_id) = chat_id else {
        return Ok(notification);
    };

    match telegram.send_message(chat_id, &telegram_text(sender_username, message_preview)).await {
        Ok(()) => {
            record_telegram_delivery("sent");
            tracing::debug!(receiver_id = %receiver_id, chat_id, "dm forwarded to telegram");
        }
        Err(e) => {
            record_telegram_delivery("failed");
            tracing::warn!(error = %e, receiver_id = %receiver_id, chat_id, "telegram forward failed");
        }
    }

    Ok(notification)
}
