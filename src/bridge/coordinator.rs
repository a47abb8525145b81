//! Coordination Context
//!
//! Owns the application-level state machine and brokers every message
//! between views. Views talk to it only through their bridges; the window
//! manager is reached through [`ViewHost`].
//!
//! ```text
//! BackendStarting ──ready──▶ BackendReady ──forwarded──▶ AwaitingLogin
//!                                                            │ login-success
//!                                  ◀──────── logout ──────── ▼
//!                                                      DashboardActive
//! ```

use crate::bridge::error::BridgeError;
use crate::bridge::messages::{BridgeMessage, Envelope, ViewId, ViewKind};
use crate::bridge::views::{DashboardBridge, LoginBridge};
use crate::storage::SessionToken;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Application state of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellState {
    BackendStarting,
    BackendReady,
    AwaitingLogin,
    DashboardActive,
}

impl fmt::Display for ShellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShellState::BackendStarting => "backend_starting",
            ShellState::BackendReady => "backend_ready",
            ShellState::AwaitingLogin => "awaiting_login",
            ShellState::DashboardActive => "dashboard_active",
        };
        f.write_str(s)
    }
}

/// Window manager seam. Loading a view replaces the one currently shown;
/// the host receives the capability object for the new view.
pub trait ViewHost: Send + Sync + 'static {
    fn open_login(&self, bridge: LoginBridge);
    fn open_dashboard(&self, bridge: DashboardBridge);
}

/// Everything the coordinator reacts to
#[derive(Debug)]
pub(crate) enum Inbound {
    View(Envelope),
    BackendReady,
    Shutdown,
}

/// Cloneable handle to a running coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Inbound>,
    state: watch::Receiver<ShellState>,
}

impl CoordinatorHandle {
    /// Report that the backend passed its readiness probe
    pub fn backend_ready(&self) -> Result<(), BridgeError> {
        self.tx
            .send(Inbound::BackendReady)
            .map_err(|_| BridgeError::Disconnected)
    }

    /// Inject an envelope received over an external transport
    pub fn submit(&self, envelope: Envelope) -> Result<(), BridgeError> {
        self.tx
            .send(Inbound::View(envelope))
            .map_err(|_| BridgeError::Disconnected)
    }

    /// Stop the coordinator loop. No-op if it already stopped.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Inbound::Shutdown);
    }

    pub fn state(&self) -> ShellState {
        *self.state.borrow()
    }

    /// Wait until the coordinator reaches `target`
    pub async fn wait_for(&self, target: ShellState) -> Result<(), BridgeError> {
        let mut rx = self.state.clone();
        loop {
            if *rx.borrow_and_update() == target {
                return Ok(());
            }
            rx.changed().await.map_err(|_| BridgeError::Disconnected)?;
        }
    }
}

/// The view currently loaded in the window
struct ActiveView {
    id: ViewId,
    kind: ViewKind,
    downward: mpsc::UnboundedSender<Envelope>,
}

impl ActiveView {
    fn deliver(&self, message: BridgeMessage) {
        tracing::debug!(view = %self.id, message = message.name(), "Coordinator → view");
        if self.downward.send(Envelope::new(self.id, message)).is_err() {
            tracing::warn!(view = %self.id, "View went away before delivery");
        }
    }
}

/// Session bridge coordinator
pub struct Coordinator<H: ViewHost> {
    host: Arc<H>,
    tx: mpsc::UnboundedSender<Inbound>,
    rx: mpsc::UnboundedReceiver<Inbound>,
    state_tx: watch::Sender<ShellState>,
    current: Option<ActiveView>,
    /// Login view whose success notifications are still accepted
    login_view: Option<ViewId>,
    /// Token waiting for the dashboard to finish loading
    pending_token: Option<SessionToken>,
    backend_ready: bool,
}

impl<H: ViewHost> Coordinator<H> {
    pub fn new(host: Arc<H>) -> (Self, CoordinatorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ShellState::BackendStarting);

        let handle = CoordinatorHandle {
            tx: tx.clone(),
            state: state_rx,
        };

        let coordinator = Self {
            host,
            tx,
            rx,
            state_tx,
            current: None,
            login_view: None,
            pending_token: None,
            backend_ready: false,
        };

        (coordinator, handle)
    }

    /// Show the login view and process messages until shutdown
    pub async fn run(mut self) {
        tracing::info!("Coordinator started");
        self.open_login();

        while let Some(inbound) = self.rx.recv().await {
            match inbound {
                Inbound::BackendReady => self.on_backend_ready(),
                Inbound::View(envelope) => self.on_envelope(envelope),
                Inbound::Shutdown => break,
            }
        }

        tracing::info!(state = %self.state(), "Coordinator stopped");
    }

    fn state(&self) -> ShellState {
        *self.state_tx.borrow()
    }

    fn transition(&self, to: ShellState) {
        let from = self.state_tx.send_replace(to);
        if from != to {
            tracing::info!(from = %from, to = %to, "Shell state changed");
        }
    }

    fn open_login(&mut self) {
        let (bridge, downward, id) = LoginBridge::new(self.tx.clone());
        tracing::info!(view = %id, "Loading login view");

        let view = ActiveView {
            id,
            kind: ViewKind::Login,
            downward,
        };
        if self.backend_ready {
            view.deliver(BridgeMessage::BackendReady);
            self.transition(ShellState::AwaitingLogin);
        }

        self.current = Some(view);
        self.login_view = Some(id);
        self.host.open_login(bridge);
    }

    fn open_dashboard(&mut self) {
        let (bridge, downward, id) = DashboardBridge::new(self.tx.clone());
        tracing::info!(view = %id, "Loading dashboard view");

        self.current = Some(ActiveView {
            id,
            kind: ViewKind::Dashboard,
            downward,
        });
        self.host.open_dashboard(bridge);
    }

    fn on_backend_ready(&mut self) {
        if self.backend_ready {
            tracing::debug!("Duplicate backend readiness ignored");
            return;
        }
        self.backend_ready = true;
        self.transition(ShellState::BackendReady);

        if let Some(view) = self.current.as_ref().filter(|v| v.kind == ViewKind::Login) {
            view.deliver(BridgeMessage::BackendReady);
            self.transition(ShellState::AwaitingLogin);
        }
    }

    fn on_envelope(&mut self, envelope: Envelope) {
        if !envelope.is_current_version() {
            tracing::warn!(
                view = %envelope.view,
                version = envelope.version,
                "Dropping envelope with unknown version"
            );
            return;
        }

        match envelope.message {
            BridgeMessage::LoginSuccess { token } => self.on_login_success(envelope.view, token),
            BridgeMessage::DashboardLoaded => self.on_dashboard_loaded(envelope.view),
            BridgeMessage::Logout => self.on_logout(envelope.view),
            other => {
                tracing::warn!(view = %envelope.view, message = other.name(), "Views cannot send this message");
            }
        }
    }

    fn on_login_success(&mut self, view: ViewId, token: SessionToken) {
        if self.login_view != Some(view) {
            tracing::warn!(view = %view, "Login success from unknown view ignored");
            return;
        }

        match self.state() {
            ShellState::AwaitingLogin => {
                tracing::info!(view = %view, "Login succeeded, switching to dashboard");
                self.pending_token = Some(token);
                self.transition(ShellState::DashboardActive);
                self.open_dashboard();
            }
            ShellState::DashboardActive if self.pending_token.is_some() => {
                // Dashboard still loading: last token wins
                tracing::debug!(view = %view, "Replacing pending token");
                self.pending_token = Some(token);
            }
            state => {
                tracing::warn!(view = %view, state = %state, "Login success ignored in this state");
            }
        }
    }

    fn on_dashboard_loaded(&mut self, view: ViewId) {
        let Some(current) = self
            .current
            .as_ref()
            .filter(|v| v.id == view && v.kind == ViewKind::Dashboard)
        else {
            tracing::warn!(view = %view, "Load signal from a view that is not the current dashboard");
            return;
        };

        match self.pending_token.take() {
            Some(token) => {
                current.deliver(BridgeMessage::TokenDelivered { token });
                // Delivered once; later login notifications from that login view are stale
                self.login_view = None;
            }
            None => tracing::debug!(view = %view, "Dashboard reloaded without a pending token"),
        }
    }

    fn on_logout(&mut self, view: ViewId) {
        let is_current_dashboard = self
            .current
            .as_ref()
            .is_some_and(|v| v.id == view && v.kind == ViewKind::Dashboard);
        if !is_current_dashboard {
            tracing::warn!(view = %view, "Logout from a view that is not the current dashboard");
            return;
        }

        tracing::info!(view = %view, "Logout requested");
        self.pending_token = None;
        self.open_login();
    }
}
