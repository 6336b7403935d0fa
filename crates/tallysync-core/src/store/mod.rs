// ── Cache store ──
//
// Per-kind memoized collections with derived indices. A slot is either
// unpopulated or holds one complete collection for its current epoch.
// Concurrent misses for a kind join a single shared in-flight fetch; a
// fetch that completes after the kind was invalidated is discarded.

mod index;

pub use index::{GroupMap, IdMap};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tracing::{debug, warn};

use crate::gateway::Gateway;
use crate::model::{DataKind, Record};

/// An immutable collection snapshot. Replaced wholesale, never patched.
pub type Collection = Arc<Vec<Arc<Record>>>;

type PendingFetch = Shared<BoxFuture<'static, Collection>>;

// ── Slot ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct Slot {
    /// Bumped by every invalidation.
    epoch: u64,
    collection: Option<Collection>,
    by_id: Option<IdMap>,
    grouped: HashMap<String, GroupMap>,
    in_flight: Option<PendingFetch>,
}

impl Slot {
    fn reset(&mut self) {
        self.epoch += 1;
        self.collection = None;
        self.by_id = None;
        self.grouped.clear();
        self.in_flight = None;
    }

    /// Whether `collection` is still the slot's current snapshot.
    fn holds(&self, collection: &Collection) -> bool {
        self.collection
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, collection))
    }
}

// ── Statistics ───────────────────────────────────────────────────────

/// Point-in-time counters of cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Gateway calls actually issued.
    pub fetches: u64,
    /// Misses that joined an already running fetch.
    pub coalesced: u64,
    /// Fetch results dropped because the kind was invalidated meanwhile.
    pub stale_discards: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    coalesced: AtomicU64,
    stale_discards: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            stale_discards: self.stale_discards.load(Ordering::Relaxed),
        }
    }
}

// ── CacheStore ───────────────────────────────────────────────────────

/// Read-through cache in front of a [`Gateway`].
///
/// Cheaply cloneable; clones share the same slots.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    gateway: Arc<dyn Gateway>,
    slots: DashMap<DataKind, Slot>,
    counters: Counters,
}

impl CacheStore {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                gateway,
                slots: DashMap::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// The collection for `kind`, fetching it on a miss.
    ///
    /// Never fails: a gateway error is logged and cached as an empty
    /// collection, so callers cannot tell "failed" from "empty".
    pub async fn get(&self, kind: DataKind) -> Collection {
        let pending = {
            let mut slot = self.inner.slots.entry(kind).or_default();
            if let Some(collection) = &slot.collection {
                Counters::bump(&self.inner.counters.hits);
                debug!(kind = %kind, "cache hit");
                return Arc::clone(collection);
            }
            Counters::bump(&self.inner.counters.misses);

            if let Some(pending) = &slot.in_flight {
                Counters::bump(&self.inner.counters.coalesced);
                debug!(kind = %kind, epoch = slot.epoch, "joining in-flight fetch");
                pending.clone()
            } else {
                debug!(kind = %kind, epoch = slot.epoch, "cache miss, fetching");
                let pending = self.start_fetch(kind, slot.epoch);
                slot.in_flight = Some(pending.clone());
                pending
            }
        };

        pending.await
    }

    /// Id → record index over `get(kind)`. Built once per collection.
    pub async fn get_map(&self, kind: DataKind) -> IdMap {
        let collection = self.get(kind).await;

        if let Some(slot) = self.inner.slots.get(&kind) {
            if slot.holds(&collection) {
                if let Some(map) = &slot.by_id {
                    return Arc::clone(map);
                }
            }
        }

        let map = index::build_id_map(&collection);
        if let Some(mut slot) = self.inner.slots.get_mut(&kind) {
            if slot.holds(&collection) {
                slot.by_id = Some(Arc::clone(&map));
            }
        }
        map
    }

    /// `field` value → records index over `get(kind)`, built once per
    /// collection and field.
    pub async fn get_grouped(&self, kind: DataKind, field: &str) -> GroupMap {
        let collection = self.get(kind).await;

        if let Some(slot) = self.inner.slots.get(&kind) {
            if slot.holds(&collection) {
                if let Some(groups) = slot.grouped.get(field) {
                    return Arc::clone(groups);
                }
            }
        }

        let groups = index::build_grouped(&collection, field);
        if let Some(mut slot) = self.inner.slots.get_mut(&kind) {
            if slot.holds(&collection) {
                slot.grouped.insert(field.to_owned(), Arc::clone(&groups));
            }
        }
        groups
    }

    /// Drop the collection for `kind` and every index derived from it.
    ///
    /// Returns immediately. A fetch still running for the old epoch will
    /// not repopulate the slot.
    pub fn invalidate(&self, kind: DataKind) {
        let mut slot = self.inner.slots.entry(kind).or_default();
        slot.reset();
        debug!(kind = %kind, epoch = slot.epoch, "invalidated");
    }

    /// Invalidate every kind.
    pub fn clear(&self) {
        for mut slot in self.inner.slots.iter_mut() {
            slot.reset();
        }
        debug!("cache cleared");
    }

    pub fn is_populated(&self, kind: DataKind) -> bool {
        self.inner
            .slots
            .get(&kind)
            .is_some_and(|slot| slot.collection.is_some())
    }

    /// The cached collection, without fetching.
    pub fn peek(&self, kind: DataKind) -> Option<Collection> {
        self.inner
            .slots
            .get(&kind)
            .and_then(|slot| slot.collection.clone())
    }

    /// Current invalidation epoch of `kind`.
    pub fn epoch(&self, kind: DataKind) -> u64 {
        self.inner.slots.get(&kind).map_or(0, |slot| slot.epoch)
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.counters.snapshot()
    }

    // ── Fetching ─────────────────────────────────────────────────────

    fn start_fetch(&self, kind: DataKind, epoch: u64) -> PendingFetch {
        let gateway = Arc::clone(&self.inner.gateway);
        // Weak: the pending future lives inside the slot it reports to.
        let store: Weak<CacheInner> = Arc::downgrade(&self.inner);
        Counters::bump(&self.inner.counters.fetches);

        async move {
            let collection: Collection = match gateway.fetch_all(kind).await {
                Ok(records) => Arc::new(records.into_iter().map(Arc::new).collect()),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "fetch failed, caching empty collection");
                    Arc::new(Vec::new())
                }
            };
            if let Some(inner) = store.upgrade() {
                inner.complete(kind, epoch, &collection);
            }
            collection
        }
        .boxed()
        .shared()
    }
}

impl CacheInner {
    fn complete(&self, kind: DataKind, epoch: u64, collection: &Collection) {
        let mut slot = self.slots.entry(kind).or_default();
        if slot.epoch != epoch {
            Counters::bump(&self.counters.stale_discards);
            debug!(
                kind = %kind,
                started = epoch,
                current = slot.epoch,
                "discarding fetch from an older epoch"
            );
            return;
        }
        slot.collection = Some(Arc::clone(collection));
        slot.in_flight = None;
        debug!(kind = %kind, count = collection.len(), epoch, "cache populated");
    }
}
