//! Pending requests
//!
//! A [`PendingRequest`] only carries a body that is already valid JSON.
//! Free-form text typed by the user goes through [`PendingRequest::from_raw`],
//! which is the single validation step before anything reaches the network.

use crate::api::error::ClientError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// HTTP methods the backend understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Methods whose requests carry a body
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(ClientError::Validation(format!(
                "unsupported method '{}'",
                other
            ))),
        }
    }
}

/// A request ready to be sent by the API client
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl PendingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Attach a typed body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        let value =
            serde_json::to_value(body).map_err(|e| ClientError::Validation(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Build a request from user-typed text.
    ///
    /// The body is parsed as JSON before the request exists; malformed text
    /// yields [`ClientError::Validation`]. Blank text means no body, and text
    /// given to a method without a body is ignored.
    pub fn from_raw(method: Method, path: &str, raw_body: &str) -> Result<Self, ClientError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(ClientError::Validation("endpoint path is empty".to_string()));
        }

        let mut request = Self::new(method, path);
        let raw_body = raw_body.trim();

        if raw_body.is_empty() {
            return Ok(request);
        }

        if !method.has_body() {
            tracing::debug!(method = %method, "Ignoring body for method without payload");
            return Ok(request);
        }

        let value: Value = serde_json::from_str(raw_body)
            .map_err(|e| ClientError::Validation(format!("JSON error: {}", e)))?;
        request.body = Some(value);
        Ok(request)
    }
}
