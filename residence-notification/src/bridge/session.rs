//! One browser tab connected over SSE, and the registry of open tabs.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use residence_data::models::Notification;
use residence_shared::errors::{AppError, AppResult, ErrorCode};

use crate::bridge::permission::{BrowserBridge, BrowserNotice, NotificationPlatform, Permission};
use crate::bridge::sources::{mount_sources, Source};
use crate::realtime::{RealtimeListener, Subscription};

/// Frames pushed down a tab's event stream.
#[derive(Debug, Clone)]
pub enum PushFrame {
    Session { session_id: Uuid, permission: Permission },
    /// In-app list append.
    Notification(Notification),
    /// Native display request.
    SystemNotification(BrowserNotice),
    PermissionPrompt,
    Permission(Permission),
}

impl PushFrame {
    pub fn name(&self) -> &'static str {
        match self {
            PushFrame::Session { .. } => "session",
            PushFrame::Notification(_) => "notification",
            PushFrame::SystemNotification(_) => "system_notification",
            PushFrame::PermissionPrompt => "permission_prompt",
            PushFrame::Permission(_) => "permission",
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            PushFrame::Session { session_id, permission } => {
                json!({ "session_id": session_id, "permission": permission })
            }
            PushFrame::Notification(n) => serde_json::to_value(n).unwrap_or_default(),
            PushFrame::SystemNotification(notice) => serde_json::to_value(notice).unwrap_or_default(),
            PushFrame::PermissionPrompt => json!({}),
            PushFrame::Permission(permission) => json!({ "permission": permission }),
        }
    }
}

/// Platform half of the bridge for a remote tab: every platform call
/// becomes a frame on the tab's stream.
pub struct SessionPlatform {
    tx: mpsc::UnboundedSender<PushFrame>,
}

impl SessionPlatform {
    pub fn new(tx: mpsc::UnboundedSender<PushFrame>) -> Self {
        Self { tx }
    }

    pub fn push(&self, frame: PushFrame) {
        if self.tx.send(frame).is_err() {
            tracing::debug!("push frame dropped, stream already closed");
        }
    }
}

impl NotificationPlatform for SessionPlatform {
    fn prompt(&self) {
        self.push(PushFrame::PermissionPrompt);
    }

    fn display(&self, notice: BrowserNotice) {
        self.push(PushFrame::SystemNotification(notice));
    }

    fn permission_changed(&self, permission: Permission) {
        self.push(PushFrame::Permission(permission));
    }
}

pub type SessionBridge = BrowserBridge<SessionPlatform>;

pub struct BrowserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bridge: Arc<SessionBridge>,
    _subscriptions: Vec<Subscription>,
}

/// Open browser sessions keyed by session id.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, BrowserSession>>,
}

/// Closes its session when dropped. Owned by the SSE stream.
pub struct SessionGuard {
    id: Uuid,
    registry: SessionRegistry,
}

impl SessionGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.close(self.id);
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts the session's sources and queues its `session` frame.
    pub fn open(
        &self,
        listener: &RealtimeListener,
        user_id: Uuid,
        permission: Permission,
        focused: bool,
        sources: &[Source],
    ) -> (SessionGuard, mpsc::UnboundedReceiver<PushFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::now_v7();

        let platform = SessionPlatform::new(tx);
        platform.push(PushFrame::Session { session_id: id, permission });
        let bridge = Arc::new(BrowserBridge::new(platform, permission, focused));
        let subscriptions = mount_sources(listener, user_id, sources, bridge.clone());

        self.sessions.insert(
            id,
            BrowserSession {
                id,
                user_id,
                bridge,
                _subscriptions: subscriptions,
            },
        );
        tracing::info!(session_id = %id, user_id = %user_id, permission = permission.as_str(), "browser session opened");

        (
            SessionGuard {
                id,
                registry: self.clone(),
            },
            rx,
        )
    }

    /// Bridge of a session owned by `user_id`; foreign sessions read as missing.
    pub fn bridge_for(&self, id: Uuid, user_id: Uuid) -> AppResult<Arc<SessionBridge>> {
        self.sessions
            .get(&id)
            .filter(|session| session.user_id == user_id)
            .map(|session| session.bridge.clone())
            .ok_or_else(|| AppError::new(ErrorCode::BrowserSessionNotFound, "browser session not found"))
    }

    pub fn close(&self, id: Uuid) {
        if let Some((_, session)) = self.sessions.remove(&id) {
            tracing::info!(session_id = %id, user_id = %session.user_id, "browser session closed");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use residence_data::ChangeFeed;

    #[tokio::test]
    async fn guard_drop_tears_down_session_and_channels() {
        let listener = RealtimeListener::new(ChangeFeed::new());
        let registry = SessionRegistry::new();
        let user = Uuid::new_v4();

        let (guard, mut rx) = registry.open(&listener, user, Permission::Granted, false, &Source::ALL);
        assert_eq!(registry.len(), 1);
        assert!(!listener.active_channels().is_empty());

        match rx.recv().await.unwrap() {
            PushFrame::Session { session_id, permission } => {
                assert_eq!(session_id, guard.id());
                assert_eq!(permission, Permission::Granted);
            }
            other => panic!("unexpected first frame {}", other.name()),
        }

        drop(guard);
        assert!(registry.is_empty());
        assert!(listener.active_channels().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_private_to_their_user() {
        let listener = RealtimeListener::new(ChangeFeed::new());
        let registry = SessionRegistry::new();
        let owner = Uuid::new_v4();
        let (guard, _rx) = registry.open(&listener, owner, Permission::Default, true, &[]);

        assert!(registry.bridge_for(guard.id(), owner).is_ok());
        let err = registry.bridge_for(guard.id(), Uuid::new_v4()).err().unwrap();
        assert_eq!(err.code(), Some(ErrorCode::BrowserSessionNotFound));
    }

    #[test]
    fn frame_names_match_the_stream_protocol() {
        let frame = PushFrame::Permission(Permission::Denied);
        assert_eq!(frame.name(), "permission");
        assert_eq!(frame.payload()["permission"], "denied");
        assert_eq!(PushFrame::PermissionPrompt.name(), "permission_prompt");
    }
}
