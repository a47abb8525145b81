//! Bridge Message Types
//!
//! The one message contract between view contexts and the coordination
//! context. Every message travels inside a versioned [`Envelope`] naming the
//! view it comes from or goes to.

use crate::storage::SessionToken;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Version of the message contract. Envelopes carrying another version are dropped.
pub const PROTOCOL_VERSION: u16 = 1;

/// Identifies one loaded view. A reloaded view gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(Uuid);

impl ViewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First block is enough to tell views apart in logs
        let id = self.0.to_string();
        f.write_str(id.split('-').next().unwrap_or(&id))
    }
}

/// Screens the coordination context can load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Login,
    Dashboard,
}

/// Which side of the boundary a message is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// View → coordination context
    Upward,
    /// Coordination context → view
    Downward,
}

/// Messages crossing the view/coordination boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BridgeMessage {
    /// Login view obtained a token
    LoginSuccess { token: SessionToken },
    /// Dashboard view finished its initial load
    DashboardLoaded,
    /// Dashboard view asks to return to the login screen
    Logout,
    /// Backend answered its readiness probe
    BackendReady,
    /// Token handed to a freshly loaded dashboard
    TokenDelivered { token: SessionToken },
}

impl BridgeMessage {
    pub fn direction(&self) -> Direction {
        match self {
            BridgeMessage::LoginSuccess { .. }
            | BridgeMessage::DashboardLoaded
            | BridgeMessage::Logout => Direction::Upward,
            BridgeMessage::BackendReady | BridgeMessage::TokenDelivered { .. } => {
                Direction::Downward
            }
        }
    }

    /// Short name for logs; never includes the token
    pub fn name(&self) -> &'static str {
        match self {
            BridgeMessage::LoginSuccess { .. } => "login-success",
            BridgeMessage::DashboardLoaded => "dashboard-loaded",
            BridgeMessage::Logout => "logout",
            BridgeMessage::BackendReady => "backend-ready",
            BridgeMessage::TokenDelivered { .. } => "token-delivered",
        }
    }
}

/// A message addressed from or to one view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u16,
    pub view: ViewId,
    pub message: BridgeMessage,
}

impl Envelope {
    pub fn new(view: ViewId, message: BridgeMessage) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            view,
            message,
        }
    }

    pub fn is_current_version(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_success_wire_format() {
        let view = ViewId::new();
        let envelope = Envelope::new(
            view,
            BridgeMessage::LoginSuccess {
                token: SessionToken::new("abc123"),
            },
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["message"]["type"], "login-success");
        assert_eq!(json["message"]["token"], "abc123");

        let back: Envelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_unit_messages_deserialize() {
        let json = r#"{"type": "backend-ready"}"#;
        let msg: BridgeMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, BridgeMessage::BackendReady);

        let json = r#"{"type": "dashboard-loaded"}"#;
        let msg: BridgeMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.direction(), Direction::Upward);
    }

    #[test]
    fn test_unknown_message_rejected() {
        let json = r#"{"type": "open-devtools"}"#;
        assert!(serde_json::from_str::<BridgeMessage>(json).is_err());
    }

    #[test]
    fn test_message_names_hide_token() {
        let msg = BridgeMessage::TokenDelivered {
            token: SessionToken::new("secret-token"),
        };
        assert_eq!(msg.name(), "token-delivered");
        assert_eq!(msg.direction(), Direction::Downward);
    }
}
