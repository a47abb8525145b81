//! Desktop Shell
//!
//! Wires the backend supervisor, the readiness probe and the session bridge
//! into one run: start the backend, show the login view, announce readiness,
//! and tear everything down on shutdown.

use crate::api::{ApiClient, ClientResult};
use crate::backend::{wait_until_ready, BackendError, BackendProcess, BackoffPolicy, HttpProbe};
use crate::bridge::{Coordinator, CoordinatorHandle, DashboardBridge, LoginBridge, ViewHost};
use crate::config::Config;
use crate::storage::{LocalStorage, TokenStore};
use crate::views::{DashboardController, LoginController};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Coordinator stopped unexpectedly")]
    CoordinatorGone,
}

/// Builds the controllers for freshly loaded views.
///
/// Every view context gets its own token store (and so its own session
/// tier) over the shared durable storage.
#[derive(Debug, Clone)]
pub struct ViewFactory {
    config: Arc<Config>,
    storage: LocalStorage,
}

impl ViewFactory {
    pub fn new(config: Arc<Config>) -> Self {
        let storage = LocalStorage::open(&config.storage.data_dir);
        Self { config, storage }
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// API client bound to a new view context
    pub fn client(&self) -> ClientResult<ApiClient> {
        let tokens = Arc::new(TokenStore::new(self.storage.clone()));
        ApiClient::new(&self.config.backend.origin, tokens, &self.config.client)
    }

    pub fn login(&self, bridge: LoginBridge) -> ClientResult<Arc<LoginController>> {
        Ok(LoginController::new(self.client()?, bridge))
    }

    pub fn dashboard(&self, bridge: DashboardBridge) -> ClientResult<Arc<DashboardController>> {
        Ok(DashboardController::new(self.client()?, bridge))
    }
}

/// One run of the desktop shell
pub struct Shell<H: ViewHost> {
    config: Arc<Config>,
    coordinator: Coordinator<H>,
    handle: CoordinatorHandle,
}

impl<H: ViewHost> Shell<H> {
    pub fn new(config: Arc<Config>, host: Arc<H>) -> Self {
        let (coordinator, handle) = Coordinator::new(host);
        Self {
            config,
            coordinator,
            handle,
        }
    }

    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Run until `shutdown` resolves or the backend never becomes ready
    pub async fn run<F>(self, shutdown: F) -> Result<(), ShellError>
    where
        F: Future<Output = ()>,
    {
        let Shell {
            config,
            coordinator,
            handle,
        } = self;
        let backend_config = &config.backend;

        let mut process = if backend_config.external {
            tracing::info!(origin = %backend_config.origin, "Using externally managed backend");
            None
        } else {
            Some(BackendProcess::spawn(backend_config)?)
        };

        let coordinator_task = tokio::spawn(coordinator.run());

        let probe = HttpProbe::from_config(backend_config)?;
        let policy = BackoffPolicy::from_config(backend_config);

        let ready_handle = handle.clone();
        let readiness = async move {
            wait_until_ready(&probe, policy).await?;
            ready_handle
                .backend_ready()
                .map_err(|_| ShellError::CoordinatorGone)
        };

        tokio::pin!(shutdown);

        let (mut result, stopped_early) = tokio::select! {
            ready = readiness => (ready, false),
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested before backend was ready");
                (Ok(()), true)
            }
        };

        if result.is_ok() && !stopped_early {
            shutdown.await;
            tracing::info!("Shutting down");
        }

        handle.shutdown();
        if coordinator_task.await.is_err() {
            tracing::error!("Coordinator task panicked");
            result = result.and(Err(ShellError::CoordinatorGone));
        }

        if let Some(process) = process.as_mut() {
            process.terminate(backend_config.shutdown_grace()).await?;
        }

        tracing::info!("Shell stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ShellState;
    use crate::storage::{SessionToken, TOKEN_KEY};
    use crate::views::StatusKind;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::{mpsc, oneshot};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Host that attaches controllers the way a real window would
    struct ControllerHost {
        factory: ViewFactory,
        logins: mpsc::UnboundedSender<Arc<LoginController>>,
        dashboards: mpsc::UnboundedSender<Arc<DashboardController>>,
    }

    impl ViewHost for ControllerHost {
        fn open_login(&self, bridge: LoginBridge) {
            let controller = self.factory.login(bridge).unwrap();
            controller.attach().unwrap();
            let _ = self.logins.send(controller);
        }

        fn open_dashboard(&self, bridge: DashboardBridge) {
            let controller = self.factory.dashboard(bridge).unwrap();
            controller.attach().unwrap();
            let _ = self.dashboards.send(controller);
        }
    }

    struct Harness {
        _server: MockServer,
        dir: TempDir,
        handle: CoordinatorHandle,
        logins: mpsc::UnboundedReceiver<Arc<LoginController>>,
        dashboards: mpsc::UnboundedReceiver<Arc<DashboardController>>,
        stop: oneshot::Sender<()>,
        run: tokio::task::JoinHandle<Result<(), ShellError>>,
    }

    /// Mock backend answering the readiness probe
    async fn mock_backend() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": "Diabetes API"})),
            )
            .mount(&server)
            .await;
        server
    }

    /// Start the shell against `server`; mocks must be mounted first
    fn start_shell(server: MockServer, remembered: Option<&str>) -> Harness {
        let dir = TempDir::new().unwrap();
        if let Some(token) = remembered {
            LocalStorage::open(dir.path())
                .set(TOKEN_KEY, json!(token))
                .unwrap();
        }

        let mut config = Config::default();
        config.backend.origin = server.uri();
        config.backend.external = true;
        config.storage.data_dir = dir.path().to_string_lossy().to_string();
        let config = Arc::new(config);

        let (logins_tx, logins) = mpsc::unbounded_channel();
        let (dashboards_tx, dashboards) = mpsc::unbounded_channel();
        let host = Arc::new(ControllerHost {
            factory: ViewFactory::new(Arc::clone(&config)),
            logins: logins_tx,
            dashboards: dashboards_tx,
        });

        let shell = Shell::new(config, host);
        let handle = shell.handle();
        let (stop, stop_rx) = oneshot::channel::<()>();
        let run = tokio::spawn(shell.run(async move {
            let _ = stop_rx.await;
        }));

        Harness {
            _server: server,
            dir,
            handle,
            logins,
            dashboards,
            stop,
            run,
        }
    }

    async fn wait_for_patients(dashboard: &DashboardController) {
        for _ in 0..100 {
            if !dashboard.patients().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Patient list never loaded");
    }

    /// The login view only submits once its backend-ready handler has run
    async fn wait_for_backend_ready(login: &LoginController) {
        for _ in 0..100 {
            if login.is_backend_ready() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Login view never saw backend-ready");
    }

    #[tokio::test]
    async fn test_login_to_dashboard_and_session_expiry() {
        let server = mock_backend().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"username": "dr.ivanova", "password": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "abc123",
                "token_type": "bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/patients/"))
            .and(header("authorization", "Bearer abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "full_name": "Anna Petrova"}
            ])))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/patients/"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Token has expired"})),
            )
            .mount(&server)
            .await;

        let mut h = start_shell(server, None);

        let login = h.logins.recv().await.unwrap();
        h.handle.wait_for(ShellState::AwaitingLogin).await.unwrap();
        wait_for_backend_ready(&login).await;

        let status = login.submit("dr.ivanova", "secret", true).await;
        assert_eq!(status.kind, StatusKind::Success);

        let durable = LocalStorage::open(h.dir.path());
        assert_eq!(
            durable.get_string(TOKEN_KEY).unwrap().as_deref(),
            Some("abc123")
        );

        let dashboard = h.dashboards.recv().await.unwrap();
        assert_eq!(h.handle.state(), ShellState::DashboardActive);
        wait_for_patients(&dashboard).await;
        assert_eq!(
            dashboard.client().tokens().load(),
            Some(SessionToken::new("abc123"))
        );

        let err = dashboard.load_patients().await.unwrap_err();
        assert!(err.is_auth_failure());
        assert_eq!(err.to_string(), "Token has expired");
        assert_eq!(dashboard.client().tokens().load(), None);
        assert_eq!(durable.get_string(TOKEN_KEY).unwrap(), None);

        h.stop.send(()).unwrap();
        h.run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_remembered_session_skips_form() {
        let server = mock_backend().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .and(header("authorization", "Bearer remembered"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "dr.ivanova"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/patients/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 3, "full_name": "Oleg Smirnov"}
            ])))
            .mount(&server)
            .await;

        let mut h = start_shell(server, Some("remembered"));

        let _login = h.logins.recv().await.unwrap();
        let dashboard = h.dashboards.recv().await.unwrap();
        wait_for_patients(&dashboard).await;
        assert_eq!(dashboard.patients()[0].full_name, "Oleg Smirnov");

        h.stop.send(()).unwrap();
        h.run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_logout_reopens_login() {
        let server = mock_backend().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "abc123"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/patients/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let mut h = start_shell(server, None);

        let login = h.logins.recv().await.unwrap();
        h.handle.wait_for(ShellState::AwaitingLogin).await.unwrap();
        wait_for_backend_ready(&login).await;
        login.submit("dr.ivanova", "secret", false).await;

        let dashboard = h.dashboards.recv().await.unwrap();
        dashboard.logout().unwrap();

        let relogin = h.logins.recv().await.unwrap();
        h.handle.wait_for(ShellState::AwaitingLogin).await.unwrap();
        assert_eq!(relogin.client().tokens().load(), None);

        h.stop.send(()).unwrap();
        h.run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_readiness_timeout_fails_run() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let origin = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
        drop(listener);

        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.backend.origin = origin;
        config.backend.external = true;
        config.backend.ready_timeout_secs = 1;
        config.storage.data_dir = dir.path().to_string_lossy().to_string();

        struct NoopHost;
        impl ViewHost for NoopHost {
            fn open_login(&self, _bridge: LoginBridge) {}
            fn open_dashboard(&self, _bridge: DashboardBridge) {}
        }

        let shell = Shell::new(Arc::new(config), Arc::new(NoopHost));
        let handle = shell.handle();
        let err = shell.run(std::future::pending()).await.unwrap_err();
        assert!(matches!(
            err,
            ShellError::Backend(BackendError::ReadinessTimeout { .. })
        ));
        assert_eq!(handle.state(), ShellState::BackendStarting);
    }
}
