use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use residence_shared::errors::{AppError, AppResult};

use crate::services::dm_dispatcher;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct DmNotificationRequest {
    pub receiver_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub sender_username: String,
    pub message_preview: String,
}

#[derive(Debug, Serialize)]
pub struct DmNotificationResponse {
    pub success: bool,
}

/// POST /send-dm-notification
/// Called after a direct message is persisted. The body is parsed here so that
/// a bad payload still gets the JSON error envelope.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<Json<DmNotificationResponse>> {
    let req: DmNotificationRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("invalid request body: {e}")))?;
    req.validate()?;

    let notification = dm_dispatcher::dispatch(
        state.store.as_ref(),
        state.telegram.as_ref(),
        req.receiver_id,
        &req.sender_username,
        &req.message_preview,
    )
    .await?;

    tracing::info!(
        notification_id = %notification.id,
        receiver_id = %req.receiver_id,
        "dm notification dispatched"
    );
    Ok(Json(DmNotificationResponse { success: true }))
}
