//! Backend supervisor errors

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to start backend with {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backend did not become ready within {timeout:?} ({attempts} probes)")]
    ReadinessTimeout { timeout: Duration, attempts: u32 },

    #[error("Backend process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;
