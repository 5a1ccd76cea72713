//! Resource cache storage.
//!
//! One entry per `QueryKey`, each backed by a `watch` channel so subscribers
//! of that key (and only those) are notified on every transition. All
//! transitions happen under a single lock, so `begin` → `complete`/`fail`
//! is atomic with respect to reads.

use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use lru::LruCache;
use metrics::counter;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info};

use super::config::CacheConfig;
use super::entry::{CacheEntry, ErrorInfo, Payload, QueryStatus};
use super::events::{Epoch, EpochCounter};
use super::keys::{QueryKey, Tag};
use super::lock::{rw_read, rw_write};
use super::planner::InvalidationPlan;
use super::registry::TagRegistry;

const SOURCE: &str = "cache::store";

const METRIC_CACHE_HIT: &str = "catalog_cache_hit_total";
const METRIC_CACHE_MISS: &str = "catalog_cache_miss_total";
const METRIC_CACHE_COALESCED: &str = "catalog_cache_coalesced_total";
const METRIC_CACHE_EVICT: &str = "catalog_cache_evict_total";
const METRIC_CACHE_INVALIDATED: &str = "catalog_cache_invalidated_total";

/// Proof that the holder owns the in-flight fetch for a key.
///
/// Only the ticket issued by the latest `begin` can settle the entry.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    key: QueryKey,
    epoch: Epoch,
    tags: HashSet<Tag>,
}

impl FetchTicket {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }
}

/// Outcome of [`ResourceCache::begin`].
#[derive(Debug)]
pub enum Begin {
    /// The caller must perform the fetch and settle it with the ticket.
    Started(FetchTicket),
    /// A fetch for an equal key is already in flight; wait for it instead.
    Coalesced,
}

struct Slot {
    tx: watch::Sender<CacheEntry>,
    in_flight: Option<Epoch>,
    invalidated_in_flight: bool,
}

impl Slot {
    fn new(key: QueryKey) -> Self {
        let (tx, _rx) = watch::channel(CacheEntry::idle(key));
        Self {
            tx,
            in_flight: None,
            invalidated_in_flight: false,
        }
    }

    fn snapshot(&self) -> CacheEntry {
        self.tx.borrow().clone()
    }

    fn update(&self, f: impl FnOnce(&mut CacheEntry)) {
        self.tx.send_modify(f);
    }

    fn is_evictable(&self) -> bool {
        self.in_flight.is_none() && self.tx.receiver_count() == 0
    }
}

struct CacheState {
    slots: LruCache<QueryKey, Slot>,
    registry: TagRegistry,
}

/// Keyed store of fetched resources with tag-based invalidation.
///
/// Constructed once per session and shared (`Arc`) with every consumer.
/// Performs no I/O; fetching is the query executor's job.
pub struct ResourceCache {
    config: CacheConfig,
    state: RwLock<CacheState>,
    epochs: EpochCounter,
}

impl ResourceCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CacheState {
                slots: LruCache::unbounded(),
                registry: TagRegistry::new(),
            }),
            epochs: EpochCounter::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Snapshot of the entry for `key`, or a fresh `Idle` entry.
    ///
    /// Entries older than the configured `stale_after` age are reported stale.
    pub fn read(&self, key: &QueryKey) -> CacheEntry {
        let mut state = rw_write(&self.state, SOURCE, "read");
        match state.slots.get(key) {
            Some(slot) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                self.apply_age_policy(slot.snapshot())
            }
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                CacheEntry::idle(key.clone())
            }
        }
    }

    /// Subscribe to transitions of `key`. Subscribed entries are never evicted.
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<CacheEntry> {
        let mut state = rw_write(&self.state, SOURCE, "subscribe");
        let rx = state
            .slots
            .get_or_insert_mut(key.clone(), || Slot::new(key.clone()))
            .tx
            .subscribe();
        self.evict_overflow(&mut state);
        rx
    }

    /// Move `key` to `Loading`, unless a fetch for it is already in flight.
    ///
    /// Previously settled data is kept on the entry while loading.
    pub fn begin(&self, key: &QueryKey, tags: HashSet<Tag>) -> Begin {
        let mut guard = rw_write(&self.state, SOURCE, "begin");
        let state = &mut *guard;

        let slot = state
            .slots
            .get_or_insert_mut(key.clone(), || Slot::new(key.clone()));
        if let Some(in_flight) = slot.in_flight {
            counter!(METRIC_CACHE_COALESCED).increment(1);
            debug!(key = %key, in_flight, "Fetch coalesced with in-flight request");
            return Begin::Coalesced;
        }

        let epoch = self.epochs.next();
        slot.in_flight = Some(epoch);
        slot.invalidated_in_flight = false;
        slot.update(|entry| {
            entry.status = QueryStatus::Loading;
            entry.error = None;
        });

        let mut registered = state.registry.tags_for_key(key);
        registered.extend(tags.iter().cloned());
        state.registry.register(key, registered);

        debug!(key = %key, epoch, "Fetch started");
        self.evict_overflow(state);

        Begin::Started(FetchTicket {
            key: key.clone(),
            epoch,
            tags,
        })
    }

    /// Settle the ticket's entry as `Success`.
    ///
    /// `result_tags` are added to the tags given at `begin`. Returns `false`
    /// (and changes nothing) when the ticket no longer owns the entry.
    pub fn complete<T: Any + Send + Sync>(
        &self,
        ticket: &FetchTicket,
        data: T,
        result_tags: HashSet<Tag>,
    ) -> bool {
        let mut guard = rw_write(&self.state, SOURCE, "complete");
        let state = &mut *guard;

        let Some(slot) = Self::owned_slot(&mut state.slots, ticket) else {
            return false;
        };
        slot.in_flight = None;
        let stale = std::mem::take(&mut slot.invalidated_in_flight);

        let mut tags = ticket.tags.clone();
        tags.extend(result_tags);
        let payload: Payload = Arc::new(data);
        let entry_tags = tags.clone();
        slot.update(move |entry| {
            entry.status = QueryStatus::Success;
            entry.data = Some(payload);
            entry.error = None;
            entry.fetched_at = Some(OffsetDateTime::now_utc());
            entry.stale = stale;
            entry.tags = entry_tags;
        });
        state.registry.register(&ticket.key, tags);

        debug!(key = %ticket.key, epoch = ticket.epoch, stale, "Fetch completed");
        true
    }

    /// Settle the ticket's entry as `Error`, keeping any earlier data.
    ///
    /// Never panics or propagates; returns `false` for a superseded ticket.
    pub fn fail(&self, ticket: &FetchTicket, error: ErrorInfo) -> bool {
        let mut guard = rw_write(&self.state, SOURCE, "fail");
        let state = &mut *guard;

        let Some(slot) = Self::owned_slot(&mut state.slots, ticket) else {
            return false;
        };
        slot.in_flight = None;
        let invalidated = std::mem::take(&mut slot.invalidated_in_flight);
        let tags = state.registry.tags_for_key(&ticket.key);

        debug!(key = %ticket.key, epoch = ticket.epoch, error = %error, "Fetch failed");
        slot.update(move |entry| {
            entry.status = QueryStatus::Error;
            entry.error = Some(error);
            entry.fetched_at = Some(OffsetDateTime::now_utc());
            entry.stale |= invalidated;
            entry.tags = tags;
        });
        true
    }

    /// Mark every entry carrying `tag` stale. Data is kept for display.
    ///
    /// Returns the number of affected entries.
    pub fn invalidate(&self, tag: &Tag) -> usize {
        self.invalidate_tags(std::iter::once(tag))
    }

    /// Apply an invalidation plan in one critical section.
    pub fn apply(&self, plan: &InvalidationPlan) -> usize {
        if plan.clear_all {
            let cleared = self.len();
            self.clear();
            return cleared;
        }
        self.invalidate_tags(plan.tags.iter())
    }

    fn invalidate_tags<'a>(&self, tags: impl Iterator<Item = &'a Tag>) -> usize {
        let mut guard = rw_write(&self.state, SOURCE, "invalidate");
        let state = &mut *guard;
        let epoch = self.epochs.next();

        let mut affected: HashSet<QueryKey> = HashSet::new();
        for tag in tags {
            let keys = state.registry.keys_for_tag(tag);
            info!(tag = %tag, affected = keys.len(), epoch, "Cache tag invalidated");
            affected.extend(keys);
        }

        for key in &affected {
            if let Some(slot) = state.slots.peek_mut(key) {
                if slot.in_flight.is_some() {
                    slot.invalidated_in_flight = true;
                }
                slot.update(|entry| {
                    entry.stale = true;
                    entry.invalidated_at = Some(epoch);
                });
            }
        }

        counter!(METRIC_CACHE_INVALIDATED).increment(affected.len() as u64);
        affected.len()
    }

    /// Reset the cache.
    ///
    /// Subscribed entries go back to `Idle` so their subscribers stay
    /// connected; everything else is dropped. In-flight fetches are orphaned
    /// and their results discarded.
    pub fn clear(&self) {
        let mut guard = rw_write(&self.state, SOURCE, "clear");
        let state = &mut *guard;

        let mut dropped = Vec::new();
        for (key, slot) in &mut state.slots {
            slot.in_flight = None;
            slot.invalidated_in_flight = false;
            if slot.tx.receiver_count() == 0 {
                dropped.push(key.clone());
            } else {
                let idle = CacheEntry::idle(key.clone());
                slot.tx.send_replace(idle);
            }
        }
        for key in &dropped {
            state.slots.pop(key);
        }
        state.registry.clear();
        info!(dropped = dropped.len(), "Cache cleared");
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        rw_read(&self.state, SOURCE, "len").slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tags currently registered for `key`.
    pub fn tags_for(&self, key: &QueryKey) -> HashSet<Tag> {
        rw_read(&self.state, SOURCE, "tags_for")
            .registry
            .tags_for_key(key)
    }

    fn owned_slot<'a>(
        slots: &'a mut LruCache<QueryKey, Slot>,
        ticket: &FetchTicket,
    ) -> Option<&'a mut Slot> {
        let Some(slot) = slots.peek_mut(&ticket.key) else {
            debug!(key = %ticket.key, epoch = ticket.epoch, "Discarding result: entry gone");
            return None;
        };
        if slot.in_flight != Some(ticket.epoch) {
            debug!(
                key = %ticket.key,
                epoch = ticket.epoch,
                in_flight = ?slot.in_flight,
                "Discarding result: ticket superseded"
            );
            return None;
        }
        Some(slot)
    }

    fn apply_age_policy(&self, mut entry: CacheEntry) -> CacheEntry {
        if let (Some(max_age), Some(fetched_at)) = (self.config.stale_after(), entry.fetched_at)
            && entry.status == QueryStatus::Success
            && OffsetDateTime::now_utc() - fetched_at >= max_age
        {
            entry.stale = true;
        }
        entry
    }

    fn evict_overflow(&self, state: &mut CacheState) {
        let cap = self.config.max_entries_non_zero().get();
        while state.slots.len() > cap {
            let victim = state
                .slots
                .iter()
                .rev()
                .find(|(_, slot)| slot.is_evictable())
                .map(|(key, _)| key.clone());
            let Some(key) = victim else {
                break;
            };
            state.slots.pop(&key);
            state.registry.unregister(&key);
            counter!(METRIC_CACHE_EVICT).increment(1);
            debug!(key = %key, "Evicted idle cache entry");
        }
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;
    use crate::cache::entry::ErrorKind;
    use crate::cache::keys::ResourceKind;

    fn list_key(offset: u32) -> QueryKey {
        QueryKey::new("/products")
            .with_param("offset", offset)
            .with_param("limit", 20)
    }

    fn list_tags() -> HashSet<Tag> {
        HashSet::from([Tag::list(ResourceKind::Product)])
    }

    fn started(begin: Begin) -> FetchTicket {
        match begin {
            Begin::Started(ticket) => ticket,
            Begin::Coalesced => panic!("expected a fresh fetch"),
        }
    }

    #[test]
    fn read_of_unknown_key_is_idle() {
        let cache = ResourceCache::default();
        let entry = cache.read(&list_key(0));
        assert_eq!(entry.status, QueryStatus::Idle);
        assert!(cache.is_empty());
    }

    #[test]
    fn begin_complete_read_roundtrip() {
        let cache = ResourceCache::default();
        let key = list_key(0);

        let ticket = started(cache.begin(&key, list_tags()));
        assert_eq!(cache.read(&key).status, QueryStatus::Loading);

        assert!(cache.complete(
            &ticket,
            vec!["a".to_string()],
            HashSet::from([Tag::entity(ResourceKind::Product, "a")]),
        ));

        let entry = cache.read(&key);
        assert_eq!(entry.status, QueryStatus::Success);
        assert!(entry.fetched_at.is_some());
        assert_eq!(
            entry.data::<Vec<String>>().expect("data").as_slice(),
            ["a".to_string()]
        );
        assert!(entry.tags.contains(&Tag::list(ResourceKind::Product)));
        assert!(entry.tags.contains(&Tag::entity(ResourceKind::Product, "a")));
    }

    #[test]
    fn concurrent_begin_is_coalesced() {
        let cache = ResourceCache::default();
        let key = list_key(0);
        let ticket = started(cache.begin(&key, list_tags()));

        let equal_key = QueryKey::new("/products")
            .with_param("limit", 20)
            .with_param("offset", 0);
        assert!(matches!(
            cache.begin(&equal_key, list_tags()),
            Begin::Coalesced
        ));

        cache.complete(&ticket, 1_u32, HashSet::new());
        assert!(matches!(cache.begin(&key, list_tags()), Begin::Started(_)));
    }

    #[test]
    fn invalidate_keeps_data_and_marks_stale() {
        let cache = ResourceCache::default();
        let key = list_key(0);
        let ticket = started(cache.begin(&key, list_tags()));
        cache.complete(&ticket, 7_u32, HashSet::new());

        let affected = cache.invalidate(&Tag::list(ResourceKind::Product));
        assert_eq!(affected, 1);

        let entry = cache.read(&key);
        assert_eq!(entry.status, QueryStatus::Success);
        assert!(entry.stale);
        assert!(entry.invalidated_at.is_some());
        assert_eq!(*entry.data::<u32>().expect("data"), 7);
    }

    #[test]
    fn invalidate_unrelated_tag_affects_nothing() {
        let cache = ResourceCache::default();
        let key = list_key(0);
        let ticket = started(cache.begin(&key, list_tags()));
        cache.complete(&ticket, 7_u32, HashSet::new());

        assert_eq!(cache.invalidate(&Tag::list(ResourceKind::Category)), 0);
        assert!(!cache.read(&key).stale);
    }

    #[test]
    fn invalidation_during_flight_leaves_result_stale() {
        let cache = ResourceCache::default();
        let key = list_key(0);
        let ticket = started(cache.begin(&key, list_tags()));

        cache.invalidate(&Tag::list(ResourceKind::Product));
        cache.complete(&ticket, 1_u32, HashSet::new());

        let entry = cache.read(&key);
        assert_eq!(entry.status, QueryStatus::Success);
        assert!(entry.stale);
    }

    #[test]
    fn fail_records_error_and_keeps_previous_data() {
        let cache = ResourceCache::default();
        let key = list_key(0);
        let ticket = started(cache.begin(&key, list_tags()));
        cache.complete(&ticket, 3_u32, HashSet::new());

        let ticket = started(cache.begin(&key, list_tags()));
        assert!(cache.fail(
            &ticket,
            ErrorInfo::new(ErrorKind::Http, "bad gateway").with_status(502)
        ));

        let entry = cache.read(&key);
        assert_eq!(entry.status, QueryStatus::Error);
        assert_eq!(entry.error.as_ref().and_then(|e| e.status), Some(502));
        assert_eq!(*entry.data::<u32>().expect("previous data"), 3);
    }

    #[test]
    fn clear_orphans_in_flight_ticket() {
        let cache = ResourceCache::default();
        let key = list_key(0);
        let ticket = started(cache.begin(&key, list_tags()));

        cache.clear();
        assert!(!cache.complete(&ticket, 1_u32, HashSet::new()));
        assert_eq!(cache.read(&key).status, QueryStatus::Idle);
    }

    #[test]
    fn clear_resets_subscribed_entries_without_dropping_them() {
        let cache = ResourceCache::default();
        let key = list_key(0);
        let rx = cache.subscribe(&key);
        let ticket = started(cache.begin(&key, list_tags()));
        cache.complete(&ticket, 1_u32, HashSet::new());

        cache.clear();

        assert_eq!(cache.len(), 1);
        assert_eq!(rx.borrow().status, QueryStatus::Idle);
        assert!(cache.tags_for(&key).is_empty());
    }

    #[test]
    fn subscribers_observe_transitions() {
        let cache = ResourceCache::default();
        let key = list_key(0);
        let mut rx = cache.subscribe(&key);

        let ticket = started(cache.begin(&key, list_tags()));
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(rx.borrow_and_update().status, QueryStatus::Loading);

        cache.complete(&ticket, 1_u32, HashSet::new());
        assert_eq!(rx.borrow_and_update().status, QueryStatus::Success);

        let other = list_key(20);
        let other_ticket = started(cache.begin(&other, list_tags()));
        cache.complete(&other_ticket, 2_u32, HashSet::new());
        assert!(!rx.has_changed().expect("sender alive"));
    }

    #[test]
    fn overflow_evicts_least_recent_unsubscribed_entry() {
        let cache = ResourceCache::new(CacheConfig {
            max_entries: 2,
            ..Default::default()
        });
        let first = list_key(0);
        let second = list_key(20);
        let third = list_key(40);

        let _pinned = cache.subscribe(&first);
        for key in [&second, &third] {
            let ticket = started(cache.begin(key, list_tags()));
            cache.complete(&ticket, 0_u32, HashSet::new());
        }

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.read(&second).status, QueryStatus::Idle);
        assert_eq!(cache.read(&third).status, QueryStatus::Success);
        assert!(cache.tags_for(&second).is_empty());
    }

    #[test]
    fn aged_entries_read_as_stale() {
        let cache = ResourceCache::new(CacheConfig {
            stale_after_seconds: Some(0),
            ..Default::default()
        });
        let key = list_key(0);
        let ticket = started(cache.begin(&key, list_tags()));
        cache.complete(&ticket, 0_u32, HashSet::new());

        assert!(cache.read(&key).stale);
    }

    #[test]
    fn apply_plan_invalidates_every_tag_once() {
        let cache = ResourceCache::default();
        let list = list_key(0);
        let detail = QueryKey::new("/products/42");
        let ticket = started(cache.begin(&list, list_tags()));
        cache.complete(&ticket, 0_u32, HashSet::new());
        let ticket = started(cache.begin(
            &detail,
            HashSet::from([Tag::entity(ResourceKind::Product, "42")]),
        ));
        cache.complete(&ticket, 0_u32, HashSet::new());

        let plan = InvalidationPlan::from_kind(&crate::cache::EventKind::ProductUpdated {
            id: "42".into(),
            slug: None,
        });
        assert_eq!(cache.apply(&plan), 2);
        assert!(cache.read(&list).stale);
        assert!(cache.read(&detail).stale);
    }

    #[test]
    fn cache_recovers_from_poisoned_lock() {
        let cache = ResourceCache::default();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.state.write().expect("state lock should be acquired");
            panic!("poison cache state lock");
        }));

        let key = list_key(0);
        assert!(matches!(cache.begin(&key, list_tags()), Begin::Started(_)));
        assert_eq!(cache.read(&key).status, QueryStatus::Loading);
    }
}
