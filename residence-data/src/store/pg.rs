use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use residence_shared::clients::db::{DbConn, DbPool};
use residence_shared::errors::{AppError, AppResult, ErrorCode};
use residence_shared::types::{ChangeEvent, Table};

use crate::feed::ChangeFeed;
use crate::models::{
    NewNotification, NewSupportTicket, NewTelegramConnection, Notification, Profile,
    SupportTicket, TelegramConnection, TicketStatus, TicketWithSubmitter,
};
use crate::schema::{notifications, profiles, support_tickets, telegram_connections};
use crate::store::Store;

/// PostgreSQL-backed store over an r2d2 pool.
pub struct PgStore {
    pool: DbPool,
    feed: ChangeFeed,
}

impl PgStore {
    pub fn new(pool: DbPool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    fn conn(&self) -> AppResult<DbConn> {
        self.pool.get().map_err(|e| {
            tracing::error!(error = %e, "failed to get db connection");
            AppError::internal("database connection error")
        })
    }
}

impl Store for PgStore {
    fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }

    fn insert_notification(&self, new: NewNotification) -> AppResult<Notification> {
        let mut conn = self.conn()?;

        let notification = diesel::insert_into(notifications::table)
            .values(&new)
            .returning(Notification::as_returning())
            .get_result(&mut conn)?;

        self.feed.emit(ChangeEvent::insert(Table::Notifications, &notification));
        Ok(notification)
    }

    fn list_notifications(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>> {
        let mut conn = self.conn()?;

        let items = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .order(notifications::created_at.desc())
            .limit(limit)
            .select(Notification::as_select())
            .load(&mut conn)?;

        Ok(items)
    }

    fn count_unread(&self, user_id: Uuid) -> AppResult<i64> {
        let mut conn = self.conn()?;

        let count: i64 = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false))
            .count()
            .get_result(&mut conn)?;

        Ok(count)
    }

    fn recent_unread(&self, user_id: Uuid, limit: i64) -> AppResult<Vec<Notification>> {
        let mut conn = self.conn()?;

        let items = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false))
            .order(notifications::created_at.desc())
            .limit(limit)
            .select(Notification::as_select())
            .load(&mut conn)?;

        Ok(items)
    }

    fn mark_read(&self, ids: &[Uuid]) -> AppResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;

        let updated: Vec<Notification> =
            diesel::update(notifications::table.filter(notifications::id.eq_any(ids)))
                .set(notifications::is_read.eq(true))
                .returning(Notification::as_returning())
                .get_results(&mut conn)?;

        for row in &updated {
            self.feed.emit(ChangeEvent::update(Table::Notifications, None, row));
        }
        Ok(updated.len())
    }

    fn mark_read_for_user(&self, id: Uuid, user_id: Uuid) -> AppResult<Notification> {
        let mut conn = self.conn()?;

        let notification = diesel::update(
            notifications::table
                .filter(notifications::id.eq(id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set(notifications::is_read.eq(true))
        .returning(Notification::as_returning())
        .get_result(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => {
                AppError::new(ErrorCode::NotificationNotFound, "notification not found")
            }
            other => AppError::Database(other),
        })?;

        self.feed.emit(ChangeEvent::update(Table::Notifications, None, &notification));
        Ok(notification)
    }

    fn mark_all_read(&self, user_id: Uuid) -> AppResult<usize> {
        let mut conn = self.conn()?;

        let updated: Vec<Notification> = diesel::update(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .returning(Notification::as_returning())
        .get_results(&mut conn)?;

        for row in &updated {
            self.feed.emit(ChangeEvent::update(Table::Notifications, None, row));
        }
        Ok(updated.len())
    }

    fn find_profile(&self, id: Uuid) -> AppResult<Option<Profile>> {
        let mut conn = self.conn()?;

        let profile = profiles::table
            .find(id)
            .select(Profile::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(profile)
    }

    fn find_connection(&self, user_id: Uuid) -> AppResult<Option<TelegramConnection>> {
        let mut conn = self.conn()?;

        let connection = telegram_connections::table
            .filter(telegram_connections::user_id.eq(user_id))
            .select(TelegramConnection::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(connection)
    }

    fn upsert_connection_code(&self, user_id: Uuid, code: &str) -> AppResult<TelegramConnection> {
        let mut conn = self.conn()?;

        let (previous, connection) = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let previous = telegram_connections::table
                .filter(telegram_connections::user_id.eq(user_id))
                .select(TelegramConnection::as_select())
                .first(conn)
                .optional()?;

            let connection = diesel::insert_into(telegram_connections::table)
                .values(&NewTelegramConnection {
                    user_id,
                    connection_code: code,
                    telegram_chat_id: None,
                    is_connected: false,
                    connected_at: None,
                })
                .on_conflict(telegram_connections::user_id)
                .do_update()
                .set((
                    telegram_connections::connection_code.eq(code),
                    telegram_connections::telegram_chat_id.eq(None::<i64>),
                    telegram_connections::is_connected.eq(false),
                    telegram_connections::connected_at.eq(None::<DateTime<Utc>>),
                ))
                .returning(TelegramConnection::as_returning())
                .get_result(conn)?;

            Ok((previous, connection))
        })?;

        let event = match previous {
            Some(ref old) => ChangeEvent::update(Table::TelegramConnections, Some(old), &connection),
            None => ChangeEvent::insert(Table::TelegramConnections, &connection),
        };
        self.feed.emit(event);
        Ok(connection)
    }

    fn consume_connection_code(&self, code: &str, chat_id: i64) -> AppResult<Option<TelegramConnection>> {
        let mut conn = self.conn()?;
        let code = code.trim().to_uppercase();

        // Lock one pending row; a concurrent connect with the same code skips it
        // and the conditional UPDATE below can never match a consumed row.
        let linked = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let target: Option<Uuid> = telegram_connections::table
                .filter(telegram_connections::connection_code.eq(&code))
                .filter(telegram_connections::is_connected.eq(false))
                .select(telegram_connections::id)
                .order(telegram_connections::id)
                .for_update()
                .skip_locked()
                .first(conn)
                .optional()?;

            let Some(id) = target else {
                return Ok(None);
            };

            diesel::update(
                telegram_connections::table
                    .filter(telegram_connections::id.eq(id))
                    .filter(telegram_connections::is_connected.eq(false)),
            )
            .set((
                telegram_connections::telegram_chat_id.eq(Some(chat_id)),
                telegram_connections::is_connected.eq(true),
                telegram_connections::connected_at.eq(Some(Utc::now())),
            ))
            .returning(TelegramConnection::as_returning())
            .get_result(conn)
            .optional()
        })?;

        if let Some(ref row) = linked {
            self.feed.emit(ChangeEvent::update(Table::TelegramConnections, None, row));
        }
        Ok(linked)
    }

    fn find_linked_connection(&self, chat_id: i64) -> AppResult<Option<TelegramConnection>> {
        let mut conn = self.conn()?;

        let connection = telegram_connections::table
            .filter(telegram_connections::telegram_chat_id.eq(chat_id))
            .filter(telegram_connections::is_connected.eq(true))
            .select(TelegramConnection::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(connection)
    }

    fn insert_ticket(&self, new: NewSupportTicket) -> AppResult<SupportTicket> {
        let mut conn = self.conn()?;

        let ticket = diesel::insert_into(support_tickets::table)
            .values(&new)
            .returning(SupportTicket::as_returning())
            .get_result(&mut conn)?;

        self.feed.emit(ChangeEvent::insert(Table::SupportTickets, &ticket));
        Ok(ticket)
    }

    fn open_tickets(&self, limit: i64) -> AppResult<Vec<TicketWithSubmitter>> {
        let mut conn = self.conn()?;

        let rows: Vec<(SupportTicket, Option<String>)> = support_tickets::table
            .left_join(profiles::table.on(support_tickets::user_id.eq(profiles::id.nullable())))
            .filter(support_tickets::status.eq(TicketStatus::Open.as_str()))
            .order(support_tickets::created_at.desc())
            .limit(limit)
            .select((SupportTicket::as_select(), profiles::username.nullable()))
            .load(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|(ticket, username)| TicketWithSubmitter { ticket, username })
            .collect())
    }

    fn find_ticket(&self, id: Uuid) -> AppResult<Option<SupportTicket>> {
        let mut conn = self.conn()?;

        let ticket = support_tickets::table
            .find(id)
            .select(SupportTicket::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(ticket)
    }

    fn answer_ticket(&self, id: Uuid, response: &str, responder: Uuid) -> AppResult<Option<SupportTicket>> {
        let mut conn = self.conn()?;

        let ticket = diesel::update(support_tickets::table.find(id))
            .set((
                support_tickets::admin_response.eq(Some(response)),
                support_tickets::responded_by.eq(Some(responder)),
                support_tickets::status.eq(TicketStatus::Answered.as_str()),
                support_tickets::updated_at.eq(Utc::now()),
            ))
            .returning(SupportTicket::as_returning())
            .get_result(&mut conn)
            .optional()?;

        if let Some(ref row) = ticket {
            self.feed.emit(ChangeEvent::update(Table::SupportTickets, None, row));
        }
        Ok(ticket)
    }
}
