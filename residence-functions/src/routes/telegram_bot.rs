use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use subtle::ConstantTimeEq;

use residence_shared::errors::{AppError, AppResult, ErrorCode};

use crate::services::bot_gateway::{self, BotCommand, BotReply};
use crate::AppState;

pub const BOT_SECRET_HEADER: &str = "x-bot-secret";

fn verify_bot_secret(headers: &HeaderMap, expected: &str) -> AppResult<()> {
    let provided = headers
        .get(BOT_SECRET_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();

    if bool::from(provided.ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::InvalidBotSecret, "unauthorized"))
    }
}

/// POST /telegram-bot
/// Body `{action, ...params}`; header `x-bot-secret` is checked before anything else.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<BotReply>> {
    if let Err(e) = verify_bot_secret(&headers, &state.bot_secret) {
        tracing::warn!("telegram bot call with invalid secret");
        return Err(e);
    }

    let body: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("invalid JSON body: {e}")))?;
    let command = BotCommand::parse(body)?;

    tracing::debug!(action = command.action(), "telegram bot action");
    let reply = bot_gateway::dispatch(state.store.as_ref(), command)?;
    Ok(Json(reply))
}
