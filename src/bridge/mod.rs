//! Session Bridge
//!
//! Message passing between isolated view contexts and the coordination
//! context. Views hold a capability object ([`LoginBridge`],
//! [`DashboardBridge`]) and never reach storage, the backend process, or
//! each other directly.
//!
//! ## Messages
//!
//! | Message           | Direction            | Payload |
//! |-------------------|----------------------|---------|
//! | `login-success`   | login → coordinator  | token   |
//! | `dashboard-loaded`| dashboard → coordinator | -    |
//! | `logout`          | dashboard → coordinator | -    |
//! | `backend-ready`   | coordinator → login  | -       |
//! | `token-delivered` | coordinator → dashboard | token |

mod coordinator;
mod error;
mod messages;
mod views;

pub use coordinator::{Coordinator, CoordinatorHandle, ShellState, ViewHost};
#[cfg(test)]
pub(crate) use coordinator::Inbound;
pub use error::BridgeError;
pub use messages::{BridgeMessage, Direction, Envelope, ViewId, ViewKind, PROTOCOL_VERSION};
pub use views::{DashboardBridge, LoginBridge};
