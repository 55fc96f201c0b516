use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// How long a displayed system notification stays up before auto-dismissal.
pub const NOTICE_TIMEOUT_MS: u64 = 5_000;

/// Browser notification permission as the platform reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Default,
    Granted,
    Denied,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Default => "default",
            Permission::Granted => "granted",
            Permission::Denied => "denied",
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Permission::Default),
            "granted" => Ok(Permission::Granted),
            "denied" => Ok(Permission::Denied),
            _ => Err(format!("unknown permission: {s}")),
        }
    }
}

/// A system notification the platform is asked to display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowserNotice {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub timeout_ms: u64,
    pub focus_on_click: bool,
}

/// The native side of the bridge: a prompt dialog and a notification surface.
pub trait NotificationPlatform: Send + Sync {
    fn prompt(&self);
    fn display(&self, notice: BrowserNotice);
    fn permission_changed(&self, _permission: Permission) {}
}

#[derive(Debug)]
struct BridgeState {
    permission: Permission,
    focused: bool,
    prompt_pending: bool,
}

/// Permission state machine `{default, granted, denied}` guarding `show`.
///
/// The platform is only prompted from `default`. Once the user has decided,
/// the state changes again only through [`BrowserBridge::sync`], which mirrors
/// what the browser reports after the user edits site settings.
pub struct BrowserBridge<P> {
    platform: P,
    state: Mutex<BridgeState>,
}

impl<P: NotificationPlatform> BrowserBridge<P> {
    pub fn new(platform: P, initial: Permission, focused: bool) -> Self {
        Self {
            platform,
            state: Mutex::new(BridgeState {
                permission: initial,
                focused,
                prompt_pending: false,
            }),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn permission(&self) -> Permission {
        self.state().permission
    }

    pub fn is_focused(&self) -> bool {
        self.state().focused
    }

    /// Asks the platform to prompt. Returns whether a prompt was issued.
    pub fn request(&self) -> bool {
        let mut state = self.state();
        if state.permission != Permission::Default || state.prompt_pending {
            return false;
        }
        state.prompt_pending = true;
        drop(state);

        self.platform.prompt();
        true
    }

    /// Applies the user's answer to an outstanding prompt.
    /// Returns `None` when no prompt is pending.
    pub fn resolve(&self, decision: Permission) -> Option<Permission> {
        let mut state = self.state();
        if !state.prompt_pending {
            return None;
        }
        if decision == Permission::Default {
            // Prompt dismissed without a choice.
            state.prompt_pending = false;
            return Some(state.permission);
        }
        state.prompt_pending = false;
        state.permission = decision;
        drop(state);

        self.platform.permission_changed(decision);
        Some(decision)
    }

    /// Passive re-sync with the reported permission. Never prompts.
    pub fn sync(&self, reported: Permission) -> Permission {
        let mut state = self.state();
        if reported != Permission::Default {
            state.prompt_pending = false;
        }
        if state.permission == reported {
            return reported;
        }
        state.permission = reported;
        drop(state);

        self.platform.permission_changed(reported);
        reported
    }

    pub fn set_focus(&self, focused: bool) {
        self.state().focused = focused;
    }

    /// Displays a system notification unless permission is not granted or the
    /// page has focus. Returns whether anything was displayed.
    pub fn show(&self, title: &str, body: &str, tag: Option<&str>) -> bool {
        {
            let state = self.state();
            if state.permission != Permission::Granted || state.focused {
                return false;
            }
        }

        self.platform.display(BrowserNotice {
            title: title.to_string(),
            body: body.to_string(),
            tag: tag.map(str::to_string),
            timeout_ms: NOTICE_TIMEOUT_MS,
            focus_on_click: true,
        });
        true
    }

    fn state(&self) -> MutexGuard<'_, BridgeState> {
        // State is plain data; a poisoned lock still holds a usable value.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
