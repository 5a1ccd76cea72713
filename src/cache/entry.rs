//! Cache entry snapshots.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;

use super::events::Epoch;
use super::keys::{QueryKey, Tag};

/// Type-erased payload shared between the cache and every reader.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Lifecycle status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

impl QueryStatus {
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_settled(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// Failure category recorded on an `Error` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Http,
    NotFound,
    Decode,
}

/// Cloneable record of a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{:?} ({status}): {}", self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// Immutable snapshot of one cache entry.
///
/// A `Loading` entry keeps the data of the previous settlement, if any, so
/// readers can keep showing it while a revalidation is in flight.
#[derive(Clone)]
pub struct CacheEntry {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub(crate) data: Option<Payload>,
    pub tags: HashSet<Tag>,
    pub fetched_at: Option<OffsetDateTime>,
    pub error: Option<ErrorInfo>,
    pub stale: bool,
    /// Epoch of the last invalidation that marked this entry stale.
    pub invalidated_at: Option<Epoch>,
}

impl CacheEntry {
    pub fn idle(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            tags: HashSet::new(),
            fetched_at: None,
            error: None,
            stale: false,
            invalidated_at: None,
        }
    }

    /// Typed view of the payload. `None` when empty or of another type.
    pub fn data<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.data.clone()?.downcast::<T>().ok()
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    /// A fetch is in flight and no earlier data exists to show meanwhile.
    pub fn is_initial_load(&self) -> bool {
        self.is_loading() && self.data.is_none()
    }

    /// Settled successfully and not marked stale.
    pub fn is_fresh(&self) -> bool {
        self.status == QueryStatus::Success && !self.stale
    }
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("status", &self.status)
            .field("has_data", &self.data.is_some())
            .field("tags", &self.tags)
            .field("fetched_at", &self.fetched_at)
            .field("error", &self.error)
            .field("stale", &self.stale)
            .field("invalidated_at", &self.invalidated_at)
            .finish()
    }
}
