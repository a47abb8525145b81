//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend process and readiness configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Origin every API path is resolved against
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Directory the backend is started from
    #[serde(default = "default_backend_dir")]
    pub working_dir: PathBuf,

    /// Python interpreter; `None` picks the backend's virtualenv
    pub python: Option<PathBuf>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Path polled by the readiness probe
    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Time granted to the backend between SIGTERM and kill
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,

    /// Skip spawning and only probe an already running backend
    #[serde(default)]
    pub external: bool,
}

fn default_origin() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_backend_dir() -> PathBuf {
    PathBuf::from("../backend")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_health_path() -> String {
    "/".to_string()
}

fn default_ready_timeout() -> u64 {
    30
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    2000
}

fn default_shutdown_grace() -> u64 {
    3000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            working_dir: default_backend_dir(),
            python: None,
            host: default_host(),
            port: default_port(),
            health_path: default_health_path(),
            ready_timeout_secs: default_ready_timeout(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            shutdown_grace_ms: default_shutdown_grace(),
            external: false,
        }
    }
}

impl BackendConfig {
    /// Interpreter to launch, falling back to the virtualenv inside `working_dir`
    pub fn python_executable(&self) -> PathBuf {
        if let Some(python) = &self.python {
            return python.clone();
        }
        if cfg!(windows) {
            self.working_dir.join("venv").join("Scripts").join("python.exe")
        } else {
            self.working_dir.join("venv").join("bin").join("python")
        }
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    5
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Client-side persisted state
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("medshell").to_string_lossy().to_string())
        .unwrap_or_else(|| "./medshell_data".to_string())
}

/// Replace a leading `~` with the home directory
fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.to_string_lossy(), rest),
        None => path.to_string(),
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        let mut config: Self = toml::from_str(content).map_err(|e| e.to_string())?;
        config.storage.data_dir = expand_home(&config.storage.data_dir);
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("medshell").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Backend overrides
        if let Some(origin) = var("MEDSHELL_BACKEND_ORIGIN") {
            self.backend.origin = origin;
        }
        if let Some(dir) = var("MEDSHELL_BACKEND_DIR") {
            self.backend.working_dir = PathBuf::from(dir);
        }
        if let Some(python) = var("MEDSHELL_PYTHON") {
            self.backend.python = Some(PathBuf::from(python));
        }

        // Client overrides
        if let Some(timeout) = var("MEDSHELL_REQUEST_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.client.request_timeout_secs = secs;
            }
        }

        // Storage overrides
        if let Some(data_dir) = var("MEDSHELL_DATA_DIR") {
            self.storage.data_dir = expand_home(&data_dir);
        }

        // Logging overrides
        if let Some(level) = var("MEDSHELL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("MEDSHELL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Medshell Configuration
#
# Environment variables override these settings:
# - MEDSHELL_BACKEND_ORIGIN
# - MEDSHELL_BACKEND_DIR
# - MEDSHELL_PYTHON
# - MEDSHELL_REQUEST_TIMEOUT
# - MEDSHELL_DATA_DIR
# - MEDSHELL_LOG_LEVEL
# - MEDSHELL_LOG_FORMAT

[backend]
# Origin all API paths are resolved against
origin = "http://127.0.0.1:8000"

# Directory containing the backend application
working_dir = "../backend"

# Python interpreter (default: <working_dir>/venv/bin/python)
# python = "/usr/bin/python3"

# Address uvicorn binds to
host = "127.0.0.1"
port = 8000

# Readiness probe: path, total timeout and backoff bounds
health_path = "/"
ready_timeout_secs = 30
initial_backoff_ms = 100
max_backoff_ms = 2000

# Grace period between SIGTERM and kill on exit (ms)
shutdown_grace_ms = 3000

# Set to true when the backend is started separately
external = false

[client]
# Per-request timeout in seconds
request_timeout_secs = 30
connect_timeout_secs = 5

[storage]
# Directory holding the persisted token and layout preferences
# (default: the platform data directory, e.g. ~/.local/share/medshell)
# data_dir = "~/.local/share/medshell"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend.origin, "http://127.0.0.1:8000");
        assert_eq!(config.backend.port, 8000);
        assert_eq!(config.client.request_timeout_secs, 30);
        assert_eq!(config.logging.format, "pretty");
        assert!(!config.backend.external);
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.backend.health_path, "/");
        assert_eq!(config.backend.shutdown_grace_ms, 3000);
        assert_eq!(config.client.connect_timeout_secs, 5);
    }

    #[test]
    fn test_generated_config_storage_is_absolute() {
        let config = Config::parse(&generate_default_config()).unwrap();
        if dirs::data_local_dir().is_some() {
            assert!(Path::new(&config.storage.data_dir).is_absolute());
            assert!(!config.storage.data_dir.starts_with('~'));
        }
    }

    #[test]
    fn test_home_prefix_expanded() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let config = Config::parse("[storage]\ndata_dir = \"~/.local/share/medshell\"\n").unwrap();
        assert_eq!(
            PathBuf::from(&config.storage.data_dir),
            home.join(".local/share/medshell")
        );

        let mut config = Config::default();
        config.apply_overrides(|key| (key == "MEDSHELL_DATA_DIR").then(|| "~".to_string()));
        assert_eq!(PathBuf::from(&config.storage.data_dir), home);

        assert_eq!(expand_home("~other/data"), "~other/data");
        assert_eq!(expand_home("/var/lib/medshell"), "/var/lib/medshell");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse("[backend]\nport = 9001\n").unwrap();
        assert_eq!(config.backend.port, 9001);
        assert_eq!(config.backend.host, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MEDSHELL_BACKEND_ORIGIN", "http://10.0.0.2:9000"),
            ("MEDSHELL_REQUEST_TIMEOUT", "7"),
            ("MEDSHELL_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.backend.origin, "http://10.0.0.2:9000");
        assert_eq!(config.client.request_timeout_secs, 7);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_invalid_timeout_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| {
            (key == "MEDSHELL_REQUEST_TIMEOUT").then(|| "soon".to_string())
        });
        assert_eq!(config.client.request_timeout_secs, 30);
    }

    #[test]
    fn test_python_executable_fallback() {
        let config = BackendConfig {
            working_dir: PathBuf::from("/srv/backend"),
            ..BackendConfig::default()
        };
        let python = config.python_executable();
        assert!(python.starts_with("/srv/backend/venv"));

        let config = BackendConfig {
            python: Some(PathBuf::from("/usr/bin/python3")),
            ..BackendConfig::default()
        };
        assert_eq!(config.python_executable(), PathBuf::from("/usr/bin/python3"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/medshell.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
