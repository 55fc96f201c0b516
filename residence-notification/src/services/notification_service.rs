use uuid::Uuid;

use residence_data::models::Notification;
use residence_data::Store;
use residence_shared::errors::AppResult;

/// Upper bound on the in-app list.
pub const LIST_LIMIT: i64 = 50;

/// The caller's most recent notifications, newest first.
pub fn list_notifications(store: &dyn Store, user_id: Uuid) -> AppResult<Vec<Notification>> {
    store.list_notifications(user_id, LIST_LIMIT)
}

pub fn count_unread(store: &dyn Store, user_id: Uuid) -> AppResult<i64> {
    store.count_unread(user_id)
}

/// Mark a single notification as read (only if it belongs to the user).
pub fn mark_read(store: &dyn Store, notification_id: Uuid, user_id: Uuid) -> AppResult<Notification> {
    let notification = store.mark_read_for_user(notification_id, user_id)?;
    tracing::debug!(notification_id = %notification_id, user_id = %user_id, "notification marked read");
    Ok(notification)
}

pub fn mark_all_read(store: &dyn Store, user_id: Uuid) -> AppResult<usize> {
    let updated = store.mark_all_read(user_id)?;
    tracing::debug!(user_id = %user_id, updated, "notifications marked read");
    Ok(updated)
}
