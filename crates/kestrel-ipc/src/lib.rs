//! Kestrel IPC Protocol
//!
//! Notification records exchanged between `kestrel` (the compositor) and
//! `kestrel-bar` (the taskbar) through the shared notification channel.

pub mod channel;

pub use channel::{ChannelError, SharedChannel};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sender identity used by the compositor
pub const COMPOSITOR_CLIENT: &str = "kestrel";

/// Sender identity used by the taskbar
pub const TASKBAR_CLIENT: &str = "kestrel-bar";

/// Reference sizing of the shared region, header included
pub const DEFAULT_CAPACITY: usize = 4096;

/// Default location of the region file for this compositor instance
pub fn channel_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));
    PathBuf::from(runtime_dir).join(format!("kestrel-{}.shm", std::process::id()))
}

// ============================================================================
// Records
// ============================================================================

/// One notification as it sits in the channel.
///
/// The wire form is a flat JSON object: `action`, `sender_client` and the
/// action's own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub sender_client: String,
    #[serde(flatten)]
    pub action: Action,
}

/// Action vocabulary, tagged by the `action` field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Compositor → taskbar: a window became managed
    AddWindow {
        window_id: u64,
        app_id: String,
        title: String,
    },

    /// Compositor → taskbar: a window was destroyed
    RemoveWindow { window_id: u64 },

    /// Taskbar → compositor: focus a window
    FocusWindow { window_id: u64 },

    /// Taskbar → compositor: drop focus from a window
    UnfocusWindow { window_id: u64 },

    /// Taskbar → compositor: minimize a window
    MinimizeWindow { window_id: u64 },

    /// Compositor → taskbar: the output geometry changed
    ConfigureEshybar { width: i32, height: i32 },
}

impl Record {
    /// Build a record sent by the compositor
    pub fn from_compositor(action: Action) -> Self {
        Self {
            sender_client: COMPOSITOR_CLIENT.to_string(),
            action,
        }
    }

    /// Build a record sent by the taskbar
    pub fn from_taskbar(action: Action) -> Self {
        Self {
            sender_client: TASKBAR_CLIENT.to_string(),
            action,
        }
    }

    pub fn is_from(&self, client: &str) -> bool {
        self.sender_client == client
    }

    /// Serialize to the wire form
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse the wire form
    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_is_flat() {
        let record = Record::from_compositor(Action::AddWindow {
            window_id: 7,
            app_id: "foot".into(),
            title: "Terminal".into(),
        });

        let value: serde_json::Value = serde_json::from_slice(&record.encode().unwrap()).unwrap();
        assert_eq!(value["action"], "ADD_WINDOW");
        assert_eq!(value["sender_client"], COMPOSITOR_CLIENT);
        assert_eq!(value["window_id"], 7);
        assert_eq!(value["app_id"], "foot");
        assert_eq!(value["title"], "Terminal");
    }

    #[test]
    fn test_decode_taskbar_command() {
        let raw = br#"{"action":"MINIMIZE_WINDOW","sender_client":"kestrel-bar","window_id":42}"#;
        let record = Record::decode(raw).unwrap();

        assert!(record.is_from(TASKBAR_CLIENT));
        match record.action {
            Action::MinimizeWindow { window_id } => assert_eq!(window_id, 42),
            _ => panic!("Wrong action"),
        }
    }

    #[test]
    fn test_configure_action_name() {
        let record = Record::from_compositor(Action::ConfigureEshybar {
            width: 1920,
            height: 1080,
        });
        let text = String::from_utf8(record.encode().unwrap()).unwrap();
        assert!(text.contains(r#""action":"CONFIGURE_ESHYBAR""#));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let raw = br#"{"action":"INIT_ESHYBAR","sender_client":"kestrel"}"#;
        assert!(Record::decode(raw).is_err());
    }
}
