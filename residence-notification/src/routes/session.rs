use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use residence_shared::types::{ApiResponse, Capability, Role, Session};

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub role: Role,
    pub capabilities: Vec<Capability>,
}

/// GET /session
/// The caller's role and the features it unlocks, for client-side gating.
pub async fn current(session: Session) -> Json<ApiResponse<SessionInfo>> {
    let capabilities = session.capabilities();
    Json(ApiResponse::ok(SessionInfo {
        user_id: session.user_id,
        username: session.username,
        role: session.role,
        capabilities,
    }))
}
