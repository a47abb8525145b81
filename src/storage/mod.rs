//! Client-side Storage
//!
//! Persisted state of the desktop shell:
//!
//! - **local**: durable JSON key/value file shared by all view contexts
//! - **token**: session token with durable and session tiers
//! - **prefs**: dashboard layout preferences
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use medshell::storage::{LocalStorage, SessionToken, TokenStore};
//!
//! let tokens = TokenStore::new(LocalStorage::open("./medshell_data"));
//! tokens.save(SessionToken::new("abc123"), true).unwrap();
//! assert!(tokens.load().is_some());
//! tokens.clear().unwrap();
//! ```

pub mod error;
pub mod local;
pub mod prefs;
pub mod token;

pub use error::{StorageError, StorageResult};
pub use local::LocalStorage;
pub use prefs::{LayoutPrefs, DEFAULT_SIDEBAR_WIDTH, MAX_SIDEBAR_WIDTH, MIN_SIDEBAR_WIDTH};
pub use token::{SessionToken, TokenStore, TOKEN_KEY};
