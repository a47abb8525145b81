//! Session bridge errors

use crate::bridge::messages::ViewKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("A handler is already registered for this {0:?} view")]
    HandlerAlreadyRegistered(ViewKind),

    #[error("Coordination context is gone")]
    Disconnected,
}
