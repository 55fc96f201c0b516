pub mod memory;
pub mod pg;

use uuid::Uuid;

use residence_shared::errors::AppResult;

use crate::feed::ChangeFeed;
use crate::models::{
    NewNotification, NewSupportTicket, Notification, Profile, SupportTicket, TelegramConnection,
    TicketWithSubmitter,
};

/// Query/command surface over the portal tables.
///
/// Methods are synchronous, matching diesel. Implementations emit a change on
/// [`Store::feed`] for every row they insert or update.
pub trait Store: Send + Sync {
    fn feed(&self) -> &ChangeFeed;

    /// Cheap liveness probe used by health checks.
    fn ping(&self) -> AppResult<()>;

    // --- notifications ---

    fn insert_notification(&self, new: NewNotification) -> AppResult<Notification>;

    /// Newest first, at most `limit` rows.
    fn list_notifications(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>>;

    fn count_unread(&self, user_id: Uuid) -> AppResult<i64>;

    /// Unread rows for the user, newest first, at most `limit`.
    fn recent_unread(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>>;

    /// Sets `is_read` on exactly the given ids, whoever owns them.
    fn mark_read(&self, ids: &[Uuid]) -> AppResult<usize>;

    /// Fails with `NotificationNotFound` when the row is absent or owned by someone else.
    fn mark_read_for_user(&self, id: Uuid, user_id: Uuid) -> AppResult<Notification>;

    fn mark_all_read(&self, user_id: Uuid) -> AppResult<usize>;

    // --- profiles ---

    fn find_profile(&self, id: Uuid) -> AppResult<Option<Profile>>;

    // --- telegram connections ---

    fn find_connection(&self, user_id: Uuid) -> AppResult<Option<TelegramConnection>>;

    /// Creates or overwrites the user's row with a fresh, unconsumed code.
    fn upsert_connection_code(&self, user_id: Uuid, code: &str) -> AppResult<TelegramConnection>;

    /// Atomically links `chat_id` to one row holding the unconsumed `code`.
    /// Never links more than one row per call, even when codes collide.
    /// Returns `None` when no unconsumed row carries the code.
    fn consume_connection_code(&self, code: &str, chat_id: i64) -> AppResult<Option<TelegramConnection>>;

    fn find_linked_connection(&self, chat_id: i64) -> AppResult<Option<TelegramConnection>>;

    // --- support tickets ---

    fn insert_ticket(&self, new: NewSupportTicket) -> AppResult<SupportTicket>;

    /// Open tickets, newest first, joined with the submitter username.
    fn open_tickets(&self, limit: i64) -> AppResult<Vec<TicketWithSubmitter>>;

    fn find_ticket(&self, id: Uuid) -> AppResult<Option<SupportTicket>>;

    /// Records the answer and moves the ticket to `answered`.
    fn answer_ticket(&self, id: Uuid, response: &str, responder: Uuid) -> AppResult<Option<SupportTicket>>;
}
