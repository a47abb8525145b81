//! Backend readiness
//!
//! The backend counts as ready once an HTTP request to its health path
//! succeeds. Probes are retried with exponential backoff under a total
//! deadline.

use crate::backend::error::{BackendError, BackendResult};
use crate::config::BackendConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::time::Instant;

/// One readiness check
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// `Ok` when the backend answers; `Err` carries the reason for logs
    async fn probe(&self) -> Result<(), String>;
}

/// `GET <origin><health_path>`, ready on any 2xx
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    pub fn new(origin: &str, health_path: &str) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| BackendError::Io(std::io::Error::other(e)))?;

        let url = format!(
            "{}/{}",
            origin.trim_end_matches('/'),
            health_path.trim_start_matches('/')
        );

        Ok(Self { client, url })
    }

    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        Self::new(&config.origin, &config.health_path)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReadinessProbe for HttpProbe {
    async fn probe(&self) -> Result<(), String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    "connection refused".to_string()
                } else if e.is_timeout() {
                    "timed out".to_string()
                } else {
                    e.to_string()
                }
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("status {}", response.status()))
        }
    }
}

/// Retry schedule for [`wait_until_ready`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub timeout: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_backoff_ms),
            max: Duration::from_millis(config.max_backoff_ms),
            timeout: config.ready_timeout(),
        }
    }

    /// Delay after `current`: doubled, capped at `max`
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

/// Poll `probe` until it succeeds or `policy.timeout` elapses
pub async fn wait_until_ready<P>(probe: &P, policy: BackoffPolicy) -> BackendResult<()>
where
    P: ReadinessProbe + ?Sized,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut delay = policy.initial.min(policy.max);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let outcome = match tokio::time::timeout(remaining, probe.probe()).await {
            Ok(outcome) => outcome,
            Err(_) => Err("probe cut off at deadline".to_string()),
        };
        match outcome {
            Ok(()) => {
                tracing::info!(
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Backend is ready"
                );
                return Ok(());
            }
            Err(reason) => {
                tracing::debug!(attempts, %reason, "Backend not ready yet");
            }
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::error!(attempts, timeout = ?policy.timeout, "Backend readiness timed out");
            return Err(BackendError::ReadinessTimeout {
                timeout: policy.timeout,
                attempts,
            });
        }

        tokio::time::sleep(delay.min(deadline - now)).await;
        delay = policy.next_delay(delay);
    }
}
