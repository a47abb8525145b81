//! View Controllers
//!
//! Screen logic for the login and dashboard views, with rendering left to
//! the view host. Each controller owns its view context's API client and
//! talks to the coordination context only through its bridge.

mod dashboard;
mod login;

pub use dashboard::{render_console, DashboardController, PatientOverview};
pub use login::{LoginController, SessionCheck};

use crate::api::ClientError;
use serde::Serialize;
use std::fmt;
use tokio::sync::watch;

/// Severity of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// User-visible status text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == StatusKind::Error
    }
}

impl From<&ClientError> for StatusMessage {
    fn from(err: &ClientError) -> Self {
        Self::error(err.user_message())
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StatusKind::Info => write!(f, "{}", self.text),
            StatusKind::Success => write!(f, "✓ {}", self.text),
            StatusKind::Error => write!(f, "✗ {}", self.text),
        }
    }
}

/// The status area of one view. Hosts subscribe to render changes.
#[derive(Debug)]
pub struct StatusLine {
    tx: watch::Sender<Option<StatusMessage>>,
}

impl Default for StatusLine {
    fn default() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }
}

impl StatusLine {
    pub fn set(&self, message: StatusMessage) {
        self.tx.send_replace(Some(message));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<StatusMessage> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StatusMessage>> {
        self.tx.subscribe()
    }
}
