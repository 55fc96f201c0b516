use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use residence_data::models::Notification;
use residence_shared::errors::AppResult;
use residence_shared::types::{ApiResponse, Session};

use crate::services::notification_service;
use crate::AppState;

/// GET /notifications
/// The 50 most recent notifications of the caller, newest first.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> AppResult<Json<ApiResponse<Vec<Notification>>>> {
    let items = notification_service::list_notifications(state.store.as_ref(), session.user_id)?;
    Ok(Json(ApiResponse::ok(items)))
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// GET /notifications/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let count = notification_service::count_unread(state.store.as_ref(), session.user_id)?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse { count })))
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// POST /notifications/mark-all-read
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> AppResult<Json<ApiResponse<MarkAllReadResponse>>> {
    let updated = notification_service::mark_all_read(state.store.as_ref(), session.user_id)?;
    Ok(Json(ApiResponse::ok(MarkAllReadResponse { updated })))
}

/// POST /notifications/:id/read
/// Mark a single owned notification as read.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Notification>>> {
    let notification = notification_service::mark_read(state.store.as_ref(), id, session.user_id)?;
    Ok(Json(ApiResponse::ok(notification)))
}

#[cfg(test)]
mod tests {
    use crate::test_support::{bearer, send, state};
    use axum::http::StatusCode;
    use residence_data::models::{NewNotification, NotificationKind};
    use residence_data::Store;
    use residence_shared::types::Role;
    use uuid::Uuid;

    #[tokio::test]
    async fn requires_a_bearer_token() {
        let (state, _) = state();
        let (status, body) = send(&state, "GET", "/notifications", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "E0004");
    }

    #[tokio::test]
    async fn lists_and_counts_own_notifications() {
        let (state, store) = state();
        let me = Uuid::new_v4();
        let auth = bearer(&state, me, Role::Member);
        store
            .insert_notification(NewNotification::new(me, NotificationKind::ContractPaid, "Paid", "Lease"))
            .unwrap();
        store
            .insert_notification(NewNotification::new(Uuid::new_v4(), NotificationKind::Default, "x", "y"))
            .unwrap();

        let (status, body) = send(&state, "GET", "/notifications", Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["type"], "contract_paid");

        let (_, body) = send(&state, "GET", "/notifications/unread-count", Some(&auth), None).await;
        assert_eq!(body["data"]["count"], 1);
    }

    #[tokio::test]
    async fn cannot_mark_someone_elses_notification() {
        let (state, store) = state();
        let owner = Uuid::new_v4();
        let row = store
            .insert_notification(NewNotification::new(owner, NotificationKind::Message, "DM", "hi"))
            .unwrap();

        let intruder = bearer(&state, Uuid::new_v4(), Role::Admin);
        let uri = format!("/notifications/{}/read", row.id);
        let (status, body) = send(&state, "POST", &uri, Some(&intruder), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "E5001");

        let owner_auth = bearer(&state, owner, Role::Member);
        let (status, body) = send(&state, "POST", &uri, Some(&owner_auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_read"], true);

        let (_, body) = send(&state, "POST", "/notifications/mark-all-read", Some(&owner_auth), None).await;
        assert_eq!(body["data"]["updated"], 0);
    }
}
