//! Backend Supervisor
//!
//! Starts the Python API server as a child process, waits for it to answer
//! HTTP, and stops it when the shell exits.

mod error;
mod probe;
mod process;

pub use error::{BackendError, BackendResult};
pub use probe::{wait_until_ready, BackoffPolicy, HttpProbe, ReadinessProbe};
pub use process::BackendProcess;
