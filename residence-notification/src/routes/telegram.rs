use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use residence_data::models::TelegramConnection;
use residence_shared::errors::AppResult;
use residence_shared::types::{ApiResponse, Session, Table};

use crate::realtime::ChangeFilter;
use crate::services::connection_service::{self, ConnectionStatus};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ConnectionCode {
    pub connection_code: String,
}

/// GET /telegram/connection
pub async fn connection_status(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> AppResult<Json<ApiResponse<ConnectionStatus>>> {
    let status = connection_service::status(state.store.as_ref(), session.user_id)?;
    Ok(Json(ApiResponse::ok(status)))
}

/// POST /telegram/connection/code
/// Issues a new pairing code; any linked chat is disconnected.
pub async fn generate_code(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> AppResult<Json<ApiResponse<ConnectionCode>>> {
    let connection = connection_service::generate_code(state.store.as_ref(), session.user_id)?;
    Ok(Json(ApiResponse::ok_with_message(
        ConnectionCode {
            connection_code: connection.connection_code,
        },
        "send this code to the bot to link your chat",
    )))
}

/// GET /telegram/connection/code
pub async fn copy_code(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> AppResult<Json<ApiResponse<ConnectionCode>>> {
    let connection_code = connection_service::pending_code(state.store.as_ref(), session.user_id)?;
    Ok(Json(ApiResponse::ok(ConnectionCode { connection_code })))
}

/// `GET /telegram/connection/events` -- live status of the caller's own
/// connection row, so a link made through the bot shows up immediately.
pub async fn connection_events(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<ConnectionStatus>();
    let subscription = state.listener.subscribe(
        ChangeFilter::updates(Table::TelegramConnections, "user_id", session.user_id),
        move |event| match event.decode::<TelegramConnection>() {
            Ok(connection) => {
                let _ = tx.send(ConnectionStatus::from(Some(connection)));
            }
            Err(e) => tracing::warn!(error = %e, "undecodable telegram connection row"),
        },
    );

    let stream = async_stream::stream! {
        let _subscription = subscription;
        while let Some(status) = rx.recv().await {
            let data = serde_json::to_string(&status).unwrap_or_default();
            yield Ok(SseEvent::default().event("connection").data(data));
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
