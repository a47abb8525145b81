//! API Client Error Types
//!
//! Every failure of a backend call falls into one of these classes so view
//! code can tell "wrong credentials / bad input" apart from "server
//! unreachable".

use std::fmt;
use thiserror::Error;

/// Why a request could not be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// No response within the configured timeout
    Timeout,
    /// Connection refused, DNS failure, TLS failure
    Connect,
    /// Anything else on the transport
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::Connect => "connect",
            NetworkErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Backend client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Request body is not well-formed JSON; nothing was sent
    #[error("Invalid request body: {0}")]
    Validation(String),

    /// Backend answered with a non-2xx status
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Request could not reach or complete against the backend
    #[error("Network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    /// 2xx response whose body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP client could not be constructed
    #[error("Client setup failed: {0}")]
    Build(String),
}

impl ClientError {
    /// Classify a transport error
    pub fn from_transport(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            NetworkErrorKind::Timeout
        } else if e.is_connect() {
            NetworkErrorKind::Connect
        } else {
            NetworkErrorKind::Other
        };

        ClientError::Network {
            kind,
            message: e.to_string(),
        }
    }

    /// HTTP status for API errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The backend rejected the credentials or the session
    pub fn is_auth_failure(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    /// Text suitable for a status line in the UI
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(detail) => format!("Malformed input: {}", detail),
            ClientError::Api { status: 401, message } => {
                format!("Session invalid or wrong credentials: {}", message)
            }
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Network {
                kind: NetworkErrorKind::Timeout,
                ..
            } => "Server unreachable (timed out).".to_string(),
            ClientError::Network { .. } => "Server unreachable.".to_string(),
            ClientError::InvalidResponse(_) => "Unexpected response from server.".to_string(),
            ClientError::Build(e) => format!("Client error: {}", e),
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
