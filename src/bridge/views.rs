//! Capability-scoped view bridges
//!
//! A view never sees the coordinator. It gets a [`LoginBridge`] or a
//! [`DashboardBridge`] exposing only the operations that screen needs.
//!
//! Handlers run on their own task, at most once. Messages that arrive before
//! a handler is registered are buffered, so registration order cannot lose a
//! delivery.

use crate::bridge::coordinator::Inbound;
use crate::bridge::error::BridgeError;
use crate::bridge::messages::{BridgeMessage, Envelope, ViewId, ViewKind};
use crate::storage::SessionToken;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Channel pair shared by both bridge kinds
#[derive(Debug)]
struct ViewChannel {
    id: ViewId,
    kind: ViewKind,
    upward: mpsc::UnboundedSender<Inbound>,
    downward: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
}

impl ViewChannel {
    fn new(
        kind: ViewKind,
        upward: mpsc::UnboundedSender<Inbound>,
    ) -> (Self, mpsc::UnboundedSender<Envelope>, ViewId) {
        let id = ViewId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Self {
            id,
            kind,
            upward,
            downward: Mutex::new(Some(rx)),
        };
        (channel, tx, id)
    }

    fn send(&self, message: BridgeMessage) -> Result<(), BridgeError> {
        tracing::debug!(view = %self.id, message = message.name(), "View → coordinator");
        self.upward
            .send(Inbound::View(Envelope::new(self.id, message)))
            .map_err(|_| BridgeError::Disconnected)
    }

    /// Spawn a task that waits for the first message `select` accepts and
    /// hands it to `handler`. Only one listener per view.
    fn listen_once<T, F, Fut>(
        &self,
        select: fn(BridgeMessage) -> Option<T>,
        handler: F,
    ) -> Result<(), BridgeError>
    where
        T: Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut rx = self
            .downward
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(BridgeError::HandlerAlreadyRegistered(self.kind))?;

        let id = self.id;
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                if !envelope.is_current_version() {
                    tracing::warn!(view = %id, version = envelope.version, "Dropping envelope with unknown version");
                    continue;
                }
                let name = envelope.message.name();
                match select(envelope.message) {
                    Some(value) => {
                        tracing::debug!(view = %id, message = name, "Delivering to view handler");
                        handler(value).await;
                        return;
                    }
                    None => {
                        tracing::debug!(view = %id, message = name, "Message not handled by this view");
                    }
                }
            }
            tracing::debug!(view = %id, "View channel closed");
        });

        Ok(())
    }
}

/// Operations available to the login screen
#[derive(Debug)]
pub struct LoginBridge {
    channel: ViewChannel,
}

impl LoginBridge {
    pub(crate) fn new(
        upward: mpsc::UnboundedSender<Inbound>,
    ) -> (Self, mpsc::UnboundedSender<Envelope>, ViewId) {
        let (channel, tx, id) = ViewChannel::new(ViewKind::Login, upward);
        (Self { channel }, tx, id)
    }

    pub fn id(&self) -> ViewId {
        self.channel.id
    }

    /// Send the token obtained at login up to the coordination context
    pub fn notify_login_success(&self, token: SessionToken) -> Result<(), BridgeError> {
        self.channel.send(BridgeMessage::LoginSuccess { token })
    }

    /// Run `handler` once the backend is ready
    pub fn on_backend_ready<F, Fut>(&self, handler: F) -> Result<(), BridgeError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.channel.listen_once(
            |message| matches!(message, BridgeMessage::BackendReady).then_some(()),
            move |()| handler(),
        )
    }
}

/// Operations available to the dashboard screen
#[derive(Debug)]
pub struct DashboardBridge {
    channel: ViewChannel,
}

impl DashboardBridge {
    pub(crate) fn new(
        upward: mpsc::UnboundedSender<Inbound>,
    ) -> (Self, mpsc::UnboundedSender<Envelope>, ViewId) {
        let (channel, tx, id) = ViewChannel::new(ViewKind::Dashboard, upward);
        (Self { channel }, tx, id)
    }

    pub fn id(&self) -> ViewId {
        self.channel.id
    }

    /// Run `handler` with the token once the coordination context delivers it.
    /// A second registration fails.
    pub fn on_token_delivered<F, Fut>(&self, handler: F) -> Result<(), BridgeError>
    where
        F: FnOnce(SessionToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.channel.listen_once(
            |message| match message {
                BridgeMessage::TokenDelivered { token } => Some(token),
                _ => None,
            },
            handler,
        )
    }

    /// Signal that the initial load finished; the token is delivered after this
    pub fn notify_loaded(&self) -> Result<(), BridgeError> {
        self.channel.send(BridgeMessage::DashboardLoaded)
    }

    /// Ask to go back to the login screen
    pub fn request_logout(&self) -> Result<(), BridgeError> {
        self.channel.send(BridgeMessage::Logout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_token_handler_fires_once() {
        let (upward, _inbound) = mpsc::unbounded_channel();
        let (bridge, downward, id) = DashboardBridge::new(upward);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        bridge
            .on_token_delivered(move |token| async move {
                let _ = seen_tx.send(token);
            })
            .unwrap();

        for t in ["first", "second"] {
            downward
                .send(Envelope::new(
                    id,
                    BridgeMessage::TokenDelivered {
                        token: SessionToken::new(t),
                    },
                ))
                .unwrap();
        }

        assert_eq!(seen_rx.recv().await.unwrap().expose(), "first");
        // The handler (and its sender) is gone after one delivery
        assert!(seen_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_second_registration_rejected() {
        let (upward, _inbound) = mpsc::unbounded_channel();
        let (bridge, _downward, _) = DashboardBridge::new(upward);

        bridge.on_token_delivered(|_| async {}).unwrap();
        let err = bridge.on_token_delivered(|_| async {}).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::HandlerAlreadyRegistered(ViewKind::Dashboard)
        ));
    }

    #[tokio::test]
    async fn test_message_buffered_before_registration() {
        let (upward, _inbound) = mpsc::unbounded_channel();
        let (bridge, downward, id) = LoginBridge::new(upward);

        downward
            .send(Envelope::new(id, BridgeMessage::BackendReady))
            .unwrap();

        let (done_tx, done_rx) = oneshot::channel();
        bridge
            .on_backend_ready(move || async move {
                let _ = done_tx.send(());
            })
            .unwrap();

        done_rx.await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_version_ignored() {
        let (upward, _inbound) = mpsc::unbounded_channel();
        let (bridge, downward, id) = LoginBridge::new(upward);

        let mut stale = Envelope::new(id, BridgeMessage::BackendReady);
        stale.version = 0;
        downward.send(stale).unwrap();
        drop(downward);

        let (done_tx, done_rx) = oneshot::channel::<()>();
        bridge
            .on_backend_ready(move || async move {
                let _ = done_tx.send(());
            })
            .unwrap();

        // Channel closes without a valid delivery, so the handler is dropped unrun
        assert!(done_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_upward_send_fails_when_coordinator_gone() {
        let (upward, inbound) = mpsc::unbounded_channel();
        let (bridge, _downward, _) = LoginBridge::new(upward);
        drop(inbound);

        let err = bridge
            .notify_login_success(SessionToken::new("t"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Disconnected));
    }

    #[tokio::test]
    async fn test_upward_envelope_carries_view_id() {
        let (upward, mut inbound) = mpsc::unbounded_channel();
        let (bridge, _downward, id) = DashboardBridge::new(upward);

        bridge.notify_loaded().unwrap();
        match inbound.recv().await.unwrap() {
            Inbound::View(envelope) => {
                assert_eq!(envelope.view, id);
                assert_eq!(envelope.message, BridgeMessage::DashboardLoaded);
            }
            other => panic!("Expected view envelope, got {:?}", other),
        }
    }
}
