use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use residence_data::models::TelegramConnection;
use residence_data::Store;
use residence_shared::errors::{AppError, AppResult, ErrorCode};

pub const CODE_LEN: usize = 8;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Pairing code: `CODE_LEN` characters drawn uniformly from `[A-Z0-9]`.
pub fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Issues a fresh code for the user, unlinking any previously connected chat.
pub fn generate_code(store: &dyn Store, user_id: Uuid) -> AppResult<TelegramConnection> {
    let code = random_code();
    let connection = store.upsert_connection_code(user_id, &code)?;

    tracing::info!(user_id = %user_id, "telegram connection code generated");
    Ok(connection)
}

/// The user's unconsumed code, for copying into the bot chat.
pub fn pending_code(store: &dyn Store, user_id: Uuid) -> AppResult<String> {
    match store.find_connection(user_id)? {
        Some(connection) if !connection.is_connected => Ok(connection.connection_code),
        _ => Err(AppError::new(
            ErrorCode::ConnectionCodeUnavailable,
            "no pending connection code, generate one first",
        )),
    }
}

#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    /// Present only while a code is waiting to be consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_code: Option<String>,
}

impl From<Option<TelegramConnection>> for ConnectionStatus {
    fn from(connection: Option<TelegramConnection>) -> Self {
        match connection {
            Some(c) if c.is_connected => Self {
                is_connected: true,
                connected_at: c.connected_at,
                connection_code: None,
            },
            Some(c) => Self {
                is_connected: false,
                connected_at: None,
                connection_code: Some(c.connection_code),
            },
            None => Self {
                is_connected: false,
                connected_at: None,
                connection_code: None,
            },
        }
    }
}

pub fn status(store: &dyn Store, user_id: Uuid) -> AppResult<ConnectionStatus> {
    Ok(store.find_connection(user_id)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use residence_data::{ChangeFeed, MemoryStore};

    #[test]
    fn codes_are_eight_uppercase_alphanumerics() {
        for _ in 0..500 {
            let code = random_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()), "{code}");
        }
    }

    #[test]
    fn generating_resets_a_linked_connection() {
        let store = MemoryStore::new(ChangeFeed::new());
        let user = Uuid::new_v4();

        let first = generate_code(&store, user).unwrap();
        store.consume_connection_code(&first.connection_code, 4242).unwrap().unwrap();
        assert!(status(&store, user).unwrap().is_connected);
        assert!(pending_code(&store, user).is_err());

        let second = generate_code(&store, user).unwrap();
        assert!(!second.is_connected);
        assert_eq!(second.telegram_chat_id, None);
        assert_eq!(pending_code(&store, user).unwrap(), second.connection_code);

        let status = status(&store, user).unwrap();
        assert!(!status.is_connected);
        assert_eq!(status.connection_code, Some(second.connection_code));
    }

    #[test]
    fn copy_without_code_is_unavailable() {
        let store = MemoryStore::new(ChangeFeed::new());
        let err = pending_code(&store, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ConnectionCodeUnavailable));
    }
}
