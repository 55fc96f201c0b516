pub mod dm_notification;
pub mod health;
pub mod telegram_bot;

use axum::http::StatusCode;

/// Bare `OPTIONS` answer; CORS headers come from the router's layer.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}
