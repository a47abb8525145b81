//! Layout preferences persisted next to the token

use crate::storage::error::StorageResult;
use crate::storage::local::LocalStorage;

/// Well-known storage key for the sidebar width
pub const SIDEBAR_WIDTH_KEY: &str = "sidebarWidth";

pub const DEFAULT_SIDEBAR_WIDTH: u32 = 280;
pub const MIN_SIDEBAR_WIDTH: u32 = 180;
pub const MAX_SIDEBAR_WIDTH: u32 = 600;

/// Dashboard layout preferences
#[derive(Debug, Clone)]
pub struct LayoutPrefs {
    storage: LocalStorage,
}

impl LayoutPrefs {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    /// Sidebar width in pixels, clamped. Missing or unreadable values yield the default.
    pub fn sidebar_width(&self) -> u32 {
        let stored = match self.storage.get(SIDEBAR_WIDTH_KEY) {
            Ok(value) => value.and_then(|v| v.as_f64()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read sidebar width");
                None
            }
        };

        match stored {
            Some(width) if width.is_finite() => clamp_width(width.round() as i64),
            _ => DEFAULT_SIDEBAR_WIDTH,
        }
    }

    /// Persist a sidebar width; returns the clamped value actually stored
    pub fn set_sidebar_width(&self, width: i64) -> StorageResult<u32> {
        let width = clamp_width(width);
        self.storage.set(SIDEBAR_WIDTH_KEY, width.into())?;
        Ok(width)
    }
}

fn clamp_width(width: i64) -> u32 {
    width.clamp(MIN_SIDEBAR_WIDTH as i64, MAX_SIDEBAR_WIDTH as i64) as u32
}
