//! Browser push sessions.
//!
//!   GET  /push/stream?permission=default&focused=true&sources=messages,contracts
//!   POST /push/sessions/:id/request
//!   POST /push/sessions/:id/permission   {"permission": "granted"}
//!   POST /push/sessions/:id/focus        {"focused": false, "permission": "granted"}
//!
//! The stream opens a session and its first frame carries the session id the
//! tab uses for the callbacks. Closing the stream closes the session.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use residence_shared::errors::AppResult;
use residence_shared::types::{ApiResponse, Session};

use crate::bridge::session::SessionBridge;
use crate::bridge::{Permission, PushFrame, Source};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub permission: Permission,
    #[serde(default = "default_focused")]
    pub focused: bool,
    pub sources: Option<String>,
}

fn default_focused() -> bool {
    true
}

pub(crate) fn frame_to_sse(frame: &PushFrame) -> SseEvent {
    SseEvent::default()
        .event(frame.name())
        .data(frame.payload().to_string())
}

/// `GET /push/stream` -- SSE stream for one browser tab.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let sources = Source::parse_list(query.sources.as_deref());
    let (guard, mut rx) = state.sessions.open(
        &state.listener,
        session.user_id,
        query.permission,
        query.focused,
        &sources,
    );

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            yield Ok(frame_to_sse(&frame));
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

#[derive(Debug, Serialize)]
pub struct BridgeState {
    pub permission: Permission,
    pub focused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompted: Option<bool>,
}

impl BridgeState {
    fn of(bridge: &SessionBridge) -> Self {
        Self {
            permission: bridge.permission(),
            focused: bridge.is_focused(),
            prompted: None,
        }
    }
}

/// POST /push/sessions/:id/request
/// The user asked to enable notifications; prompts only from `default`.
pub async fn request_permission(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BridgeState>>> {
    let bridge = state.sessions.bridge_for(id, session.user_id)?;
    let prompted = bridge.request();

    Ok(Json(ApiResponse::ok(BridgeState {
        prompted: Some(prompted),
        ..BridgeState::of(&bridge)
    })))
}

#[derive(Debug, Deserialize)]
pub struct PermissionReport {
    pub permission: Permission,
}

/// POST /push/sessions/:id/permission
/// Answers a pending prompt, otherwise re-syncs passively.
pub async fn report_permission(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(report): Json<PermissionReport>,
) -> AppResult<Json<ApiResponse<BridgeState>>> {
    let bridge = state.sessions.bridge_for(id, session.user_id)?;
    if bridge.resolve(report.permission).is_none() {
        bridge.sync(report.permission);
    }

    Ok(Json(ApiResponse::ok(BridgeState::of(&bridge))))
}

#[derive(Debug, Deserialize)]
pub struct FocusReport {
    pub focused: bool,
    #[serde(default)]
    pub permission: Option<Permission>,
}

/// POST /push/sessions/:id/focus
/// Focus, blur and visibility changes; carries the current permission for re-sync.
pub async fn report_focus(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(report): Json<FocusReport>,
) -> AppResult<Json<ApiResponse<BridgeState>>> {
    let bridge = state.sessions.bridge_for(id, session.user_id)?;
    bridge.set_focus(report.focused);
    if let Some(permission) = report.permission {
        bridge.sync(permission);
    }

    Ok(Json(ApiResponse::ok(BridgeState::of(&bridge))))
}
