//! # Medshell
//!
//! Desktop shell for a clinical diabetes dashboard: runs the Python backend,
//! keeps the clinician's session, and coordinates the login and dashboard
//! views.
//!
//! ## Features
//!
//! - **Session persistence**: Remember-me tokens survive restarts; session tokens do not
//! - **Authenticated client**: Bearer header attached whenever a token is known
//! - **Isolated views**: Views only talk to the coordinator through capability bridges
//! - **Backend supervision**: Readiness probe with backoff and graceful shutdown
//!
//! ## Modules
//!
//! - [`storage`]: Token store and persisted layout preferences
//! - [`api`]: Backend REST client
//! - [`bridge`]: View messages and the session coordinator
//! - [`backend`]: Backend process and readiness probe
//! - [`views`]: Login and dashboard controllers
//! - [`shell`]: Composition of the above into one run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use medshell::api::ApiClient;
//! use medshell::config::ClientConfig;
//! use medshell::storage::{LocalStorage, TokenStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tokens = Arc::new(TokenStore::new(LocalStorage::open("./medshell_data")));
//!     let client = ApiClient::new("http://127.0.0.1:8000", tokens, &ClientConfig::default())?;
//!
//!     let token = client.login("dr.ivanova", "secret").await?;
//!     client.tokens().save(token, true)?;
//!
//!     for patient in client.patients().await? {
//!         println!("{} {}", patient.id, patient.full_name);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod backend;
pub mod bridge;
pub mod config;
pub mod logging;
pub mod shell;
pub mod storage;
pub mod views;
