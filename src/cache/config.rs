//! Cache configuration.
//!
//! Controls the resource cache's size and age policy via `catalog.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_MAX_ENTRIES: usize = 256;

/// Resource cache configuration from `[cache]` in `catalog.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries kept; only idle, unsubscribed entries are evicted.
    pub max_entries: usize,
    /// Age after which a successful entry counts as stale on read.
    /// `None` means entries only go stale through invalidation.
    pub stale_after_seconds: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            stale_after_seconds: None,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            max_entries: settings.max_entries.get(),
            stale_after_seconds: settings.stale_after.map(|d| d.as_secs()),
        }
    }
}

impl CacheConfig {
    /// Returns the entry cap as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_seconds.map(Duration::from_secs)
    }
}
