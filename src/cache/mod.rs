//! Resource cache.
//!
//! Holds fetched catalog data keyed by [`QueryKey`], tracks per-key request
//! status, and invalidates entries by [`Tag`]:
//!
//! - **Entries** move `Idle → Loading → Success | Error`; concurrent begins
//!   for an equal key coalesce into one fetch.
//! - **Tags** label entries (`Product:LIST`, `Product:42`); invalidating a
//!   tag marks its entries stale without dropping their data.
//! - **Events** describe successful writes; the planner maps them to tags.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! max_entries = 256
//! # stale_after_seconds = 60
//! ```

mod config;
mod entry;
mod events;
mod keys;
mod lock;
mod planner;
mod registry;
mod store;

pub use config::CacheConfig;
pub use entry::{CacheEntry, ErrorInfo, ErrorKind, Payload, QueryStatus};
pub use events::{CacheEvent, Epoch, EpochCounter, EventKind};
pub use keys::{QueryKey, ResourceKind, Tag, TagParseError, TagScope};
pub use planner::InvalidationPlan;
pub use registry::TagRegistry;
pub use store::{Begin, FetchTicket, ResourceCache};
