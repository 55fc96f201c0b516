//! Browser push bridge: permission lifecycle plus focus-aware display.

pub mod permission;
pub mod session;
pub mod sources;

pub use permission::{BrowserBridge, BrowserNotice, NotificationPlatform, Permission};
pub use session::{BrowserSession, PushFrame, SessionPlatform, SessionRegistry};
pub use sources::{mount_sources, Source};
