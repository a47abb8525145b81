//! Authenticated Backend Client
//!
//! Single choke point for every call to the backend. Attaches the bearer
//! token when one is known, sends JSON, and turns every outcome into either
//! a parsed payload or a classified [`ClientError`].

use crate::api::error::{ClientError, ClientResult};
use crate::api::request::{Method, PendingRequest};
use crate::config::ClientConfig;
use crate::storage::TokenStore;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// HTTP client for the clinical backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    origin: String,
    tokens: Arc<TokenStore>,
}

impl ApiClient {
    /// Create a client for `origin` (e.g. "http://127.0.0.1:8000")
    pub fn new(
        origin: impl Into<String>,
        tokens: Arc<TokenStore>,
        config: &ClientConfig,
    ) -> ClientResult<Self> {
        Self::with_timeouts(
            origin,
            tokens,
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    pub fn with_timeouts(
        origin: impl Into<String>,
        tokens: Arc<TokenStore>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            http,
            origin: origin.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Backend origin without trailing slash
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Token store consulted on every call
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.origin, path)
        } else {
            format!("{}/{}", self.origin, path)
        }
    }

    /// Issue one request and return the parsed JSON payload.
    ///
    /// `Content-Type: application/json` is always set; `Authorization:
    /// Bearer` only when the token store holds a token. A 401 clears the
    /// token that was sent. No retries.
    pub async fn call(
        &self,
        path: &str,
        method: Method,
        body: Option<&Value>,
    ) -> ClientResult<Value> {
        let url = self.url(path);
        let token = self.tokens.load();

        let mut request = self
            .http
            .request(method.to_reqwest(), &url)
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = &token {
            request = request.bearer_auth(token.expose());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(
            method = %method,
            path = %path,
            authenticated = token.is_some(),
            "Backend request"
        );

        let response = request.send().await.map_err(|e| {
            tracing::warn!(method = %method, path = %path, error = %e, "Backend unreachable");
            ClientError::from_transport(e)
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(ClientError::from_transport)?;

        if status.is_success() {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&bytes)
                .map_err(|e| ClientError::InvalidResponse(e.to_string()));
        }

        let message = error_message(status, &bytes);

        if status == StatusCode::UNAUTHORIZED && token.is_some() {
            // A login that finished while this request was in flight keeps its token
            if self.tokens.load() == token {
                tracing::warn!(path = %path, "Authentication rejected, clearing stored token");
                if let Err(e) = self.tokens.clear() {
                    tracing::error!(error = %e, "Failed to clear rejected token");
                }
            } else {
                tracing::info!(path = %path, "Rejected token already replaced");
            }
        } else {
            tracing::debug!(status = status.as_u16(), path = %path, "Backend returned error");
        }

        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Send a pending request
    pub async fn send(&self, request: &PendingRequest) -> ClientResult<Value> {
        self.call(&request.path, request.method, request.body.as_ref())
            .await
    }

    /// Send a pending request and decode the payload into `T`
    pub async fn send_as<T: DeserializeOwned>(&self, request: &PendingRequest) -> ClientResult<T> {
        let value = self.send(request).await?;
        serde_json::from_value(value).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

/// Message for a non-2xx response: the `detail` field when present,
/// otherwise derived from the status text
fn error_message(status: StatusCode, body: &[u8]) -> String {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned());

    match detail {
        Some(Value::String(detail)) if !detail.is_empty() => detail,
        Some(Value::Null) | None => status_message(status),
        Some(other) => other.to_string(),
    }
}

fn status_message(status: StatusCode) -> String {
    format!(
        "API error: {}",
        status.canonical_reason().unwrap_or("Unknown Status")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::NetworkErrorKind;
    use crate::storage::{LocalStorage, SessionToken};
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_store(dir: &TempDir) -> Arc<TokenStore> {
        Arc::new(TokenStore::new(LocalStorage::open(dir.path())))
    }

    fn client(server: &MockServer, tokens: Arc<TokenStore>) -> ApiClient {
        ApiClient::new(server.uri(), tokens, &ClientConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_bearer_attached_when_token_known() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let tokens = token_store(&dir);
        tokens.save(SessionToken::new("t0k3n"), false).unwrap();

        Mock::given(method("GET"))
            .and(path("/api/patients/"))
            .and(header("authorization", "Bearer t0k3n"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server, tokens)
            .call("/api/patients/", Method::Get, None)
            .await
            .unwrap();
        assert_eq!(result, json!([]));
    }

    #[tokio::test]
    async fn test_no_authorization_without_token() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"username": "u", "password": "p"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "x"})))
            .mount(&server)
            .await;

        let body = json!({"username": "u", "password": "p"});
        client(&server, token_store(&dir))
            .call("/api/auth/login", Method::Post, Some(&body))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
        assert_eq!(
            requests[0].headers.get("content-type").unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_detail_becomes_error_message() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"detail": "bad credentials"})),
            )
            .mount(&server)
            .await;

        let err = client(&server, token_store(&dir))
            .call("/api/auth/login", Method::Post, Some(&json!({})))
            .await
            .unwrap_err();

        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad credentials");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_detail_uses_status_text() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server, token_store(&dir))
            .call("/api/patients/1", Method::Get, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "API error: Internal Server Error");
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_structured_detail_rendered_as_json() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "detail": [{"loc": ["body", "text"], "msg": "field required"}]
            })))
            .mount(&server)
            .await;

        let err = client(&server, token_store(&dir))
            .call("/api/recommendations/interpret", Method::Post, Some(&json!({})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("field required"));
    }

    #[tokio::test]
    async fn test_unauthorized_clears_token() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let tokens = token_store(&dir);
        tokens.save(SessionToken::new("expired"), true).unwrap();

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"detail": "Could not validate credentials"})),
            )
            .mount(&server)
            .await;

        let err = client(&server, Arc::clone(&tokens))
            .call("/api/auth/me", Method::Get, None)
            .await
            .unwrap_err();

        assert!(err.is_auth_failure());
        assert_eq!(tokens.load(), None);
        assert_eq!(token_store(&dir).load(), None);
    }

    /// Rejects the request after a new login has already stored `fresh`
    struct ReloginDuringRequest(Arc<TokenStore>);

    impl wiremock::Respond for ReloginDuringRequest {
        fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
            self.0.save(SessionToken::new("fresh"), true).unwrap();
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Token has expired"}))
        }
    }

    #[tokio::test]
    async fn test_unauthorized_keeps_newer_token() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let tokens = token_store(&dir);
        tokens.save(SessionToken::new("expired"), true).unwrap();

        Mock::given(method("GET"))
            .respond_with(ReloginDuringRequest(Arc::clone(&tokens)))
            .mount(&server)
            .await;

        let err = client(&server, Arc::clone(&tokens))
            .call("/api/patients/", Method::Get, None)
            .await
            .unwrap_err();

        assert!(err.is_auth_failure());
        assert_eq!(tokens.load(), Some(SessionToken::new("fresh")));
        assert_eq!(token_store(&dir).load(), Some(SessionToken::new("fresh")));
    }

    #[tokio::test]
    async fn test_other_errors_keep_token() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let tokens = token_store(&dir);
        tokens.save(SessionToken::new("valid"), true).unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found"})))
            .mount(&server)
            .await;

        let _ = client(&server, Arc::clone(&tokens))
            .call("/api/patients/99", Method::Get, None)
            .await;
        assert_eq!(tokens.load(), Some(SessionToken::new("valid")));
    }

    #[tokio::test]
    async fn test_empty_success_body_is_null() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let value = client(&server, token_store(&dir))
            .call("/api/patients/4", Method::Delete, None)
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_non_json_success_body() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server, token_store(&dir))
            .call("/", Method::Get, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dir = TempDir::new().unwrap();
        let client = ApiClient::new(
            format!("http://127.0.0.1:{}", port),
            token_store(&dir),
            &ClientConfig::default(),
        )
        .unwrap();

        let err = client
            .call("/api/patients/", Method::Get, None)
            .await
            .unwrap_err();
        match err {
            ClientError::Network { kind, .. } => assert_eq!(kind, NetworkErrorKind::Connect),
            other => panic!("Expected Network error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = ApiClient::with_timeouts(
            server.uri(),
            token_store(&dir),
            Duration::from_millis(100),
            Duration::from_secs(1),
        )
        .unwrap();

        let err = client.call("/", Method::Get, None).await.unwrap_err();
        match err {
            ClientError::Network { kind, .. } => assert_eq!(kind, NetworkErrorKind::Timeout),
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_url_join() {
        let dir = TempDir::new().unwrap();
        let client = ApiClient::new(
            "http://127.0.0.1:8000/",
            token_store(&dir),
            &ClientConfig::default(),
        )
        .unwrap();
        assert_eq!(client.url("/api/auth/me"), "http://127.0.0.1:8000/api/auth/me");
        assert_eq!(client.url("api/auth/me"), "http://127.0.0.1:8000/api/auth/me");
    }
}
