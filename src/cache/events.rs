//! Cache invalidation events.
//!
//! Successful writes are described as events; the planner turns a batch of
//! events into the set of tags to invalidate.

use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use uuid::Uuid;

/// Monotonic counter shared by fetch tickets and invalidations.
///
/// Lets the cache tell which of two operations on the same entry came later.
pub type Epoch = u64;

/// Source of monotonically increasing epochs.
#[derive(Debug, Default)]
pub struct EpochCounter(AtomicU64);

impl EpochCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Epoch {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> Epoch {
        self.0.load(Ordering::SeqCst)
    }
}

/// A write that changed server-side state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    ProductCreated { id: String },
    ProductUpdated { id: String, slug: Option<String> },
    ProductDeleted { id: String },
    /// The authenticated session ended; nothing cached may be reused.
    SessionEnded,
}

/// An invalidation event with identity and timestamp for logging.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}
