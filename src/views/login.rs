//! Login view controller

use crate::api::{ApiClient, ClientError, CurrentUser};
use crate::bridge::{BridgeError, LoginBridge};
use crate::views::{StatusLine, StatusMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Result of validating a remembered token
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCheck {
    /// Nothing stored; show the form
    NoToken,
    /// Stored token accepted; the dashboard was requested
    Restored(CurrentUser),
    /// Backend refused the token; it was removed
    Rejected,
    /// Backend could not be reached; the token is kept
    Unreachable,
}

pub struct LoginController {
    client: ApiClient,
    bridge: LoginBridge,
    status: StatusLine,
    backend_ready: AtomicBool,
}

impl LoginController {
    pub fn new(client: ApiClient, bridge: LoginBridge) -> Arc<Self> {
        Arc::new(Self {
            client,
            bridge,
            status: StatusLine::default(),
            backend_ready: AtomicBool::new(false),
        })
    }

    /// Validate any remembered token as soon as the backend is ready
    pub fn attach(self: &Arc<Self>) -> Result<(), BridgeError> {
        let this = Arc::clone(self);
        self.bridge.on_backend_ready(move || async move {
            this.mark_backend_ready();
            let outcome = this.restore_session().await;
            tracing::debug!(view = %this.bridge.id(), ?outcome, "Session check finished");
        })
    }

    /// Whether `backend-ready` has arrived; no request is sent before that
    pub fn is_backend_ready(&self) -> bool {
        self.backend_ready.load(Ordering::SeqCst)
    }

    fn mark_backend_ready(&self) {
        self.backend_ready.store(true, Ordering::SeqCst);
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Check a stored token against `/api/auth/me` and log in with it if accepted
    pub async fn restore_session(&self) -> SessionCheck {
        let Some(token) = self.client.tokens().load() else {
            return SessionCheck::NoToken;
        };

        self.status.set(StatusMessage::info("Checking session..."));

        match self.client.current_user().await {
            Ok(user) => {
                tracing::info!(user = user.display_name(), "Restored previous session");
                if let Err(e) = self.bridge.notify_login_success(token) {
                    self.status.set(StatusMessage::error(e.to_string()));
                    return SessionCheck::Unreachable;
                }
                self.status.clear();
                SessionCheck::Restored(user)
            }
            Err(ClientError::Api { status, .. }) => {
                tracing::info!(status, "Stored token rejected");
                if let Err(e) = self.client.tokens().clear() {
                    tracing::warn!(error = %e, "Failed to clear rejected token");
                }
                self.status.clear();
                SessionCheck::Rejected
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session check failed");
                self.status.set(StatusMessage::from(&e));
                SessionCheck::Unreachable
            }
        }
    }

    /// Log in with the form values. On success the token is stored
    /// (durably when `remember_me`) and handed to the coordinator.
    pub async fn submit(&self, username: &str, password: &str, remember_me: bool) -> StatusMessage {
        let message = match self.try_submit(username, password, remember_me).await {
            Ok(()) => StatusMessage::success("Welcome! Opening the dashboard..."),
            Err(message) => message,
        };
        self.status.set(message.clone());
        message
    }

    async fn try_submit(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> Result<(), StatusMessage> {
        if !self.is_backend_ready() {
            tracing::debug!(username, "Login attempted before backend is ready");
            return Err(StatusMessage::info("Backend is starting..."));
        }

        let token = self.client.login(username, password).await.map_err(|e| {
            tracing::info!(username, error = %e, "Login failed");
            StatusMessage::from(&e)
        })?;

        self.client
            .tokens()
            .save(token.clone(), remember_me)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to store token");
                StatusMessage::error(format!("Could not save session: {}", e))
            })?;

        tracing::info!(username, remember_me, "Login succeeded");
        self.bridge
            .notify_login_success(token)
            .map_err(|e| StatusMessage::error(e.to_string()))
    }
}
