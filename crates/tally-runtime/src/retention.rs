//! Entity lifecycle: eviction when nobody is looking, optional retention.
//!
//! An entity leaves the store once its last subscriber is gone and no kind
//! has a mutation in flight. If a mutation is still in flight, the entity is
//! marked deferred and the reconciler evicts it after resolving. Entities that
//! were never subscribed are never evicted. With a non-zero retention
//! capacity the evicted state goes into an LRU cache and comes back on the
//! next subscribe.

use std::cell::RefCell;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;
use tally_core::{EntityId, EntityInteractionState};

use crate::SharedStore;
use crate::stats::StatsCell;

pub(crate) struct Retention {
    store: SharedStore,
    cache: RefCell<Option<LruCache<EntityId, EntityInteractionState>>>,
    deferred: RefCell<HashSet<EntityId>>,
    stats: Rc<StatsCell>,
}

impl Retention {
    pub(crate) fn new(store: SharedStore, capacity: Option<NonZeroUsize>, stats: Rc<StatsCell>) -> Self {
        Self {
            store,
            cache: RefCell::new(capacity.map(LruCache::new)),
            deferred: RefCell::new(HashSet::new()),
            stats,
        }
    }

    /// Called when `entity` has no subscribers left.
    ///
    /// Returns `true` if the entity was removed from the store.
    pub(crate) fn release(&self, entity: &EntityId) -> bool {
        let evicted = {
            let mut store = self.store.borrow_mut();
            if store.has_pending(entity) {
                tracing::debug!(%entity, "eviction deferred until in-flight request resolves");
                self.deferred.borrow_mut().insert(entity.clone());
                return false;
            }
            store.remove(entity)
        };
        self.deferred.borrow_mut().remove(entity);
        let Some(state) = evicted else {
            return false;
        };

        self.stats.evicted();
        if let Some(cache) = self.cache.borrow_mut().as_mut() {
            if let Some((dropped, _)) = cache.push(entity.clone(), state) {
                if &dropped != entity {
                    tracing::trace!(entity = %dropped, "retention cache full, dropped oldest");
                }
            }
        }
        tracing::debug!(%entity, "evicted");
        true
    }

    /// Finish an eviction that [`release`](Self::release) deferred.
    ///
    /// No-op unless the entity was released while a mutation was pending.
    pub(crate) fn release_deferred(&self, entity: &EntityId) -> bool {
        if !self.deferred.borrow().contains(entity) {
            return false;
        }
        self.release(entity)
    }

    /// A subscriber is attaching to `entity`: cancel any deferred eviction
    /// and restore a retained state.
    pub(crate) fn attach(&self, entity: &EntityId) -> bool {
        self.deferred.borrow_mut().remove(entity);
        self.restore(entity)
    }

    /// Move a retained state back into the store if the store has none.
    ///
    /// Returns `true` if a retained state was restored.
    pub(crate) fn restore(&self, entity: &EntityId) -> bool {
        if self.store.borrow().contains(entity) {
            return false;
        }
        let retained = self
            .cache
            .borrow_mut()
            .as_mut()
            .and_then(|cache| cache.pop(entity));
        let Some(state) = retained else {
            return false;
        };

        self.store.borrow_mut().insert(entity.clone(), state);
        self.stats.restored();
        tracing::debug!(%entity, "restored from retention cache");
        true
    }

    /// Number of retained (evicted but remembered) entities.
    pub(crate) fn retained(&self) -> usize {
        self.cache.borrow().as_ref().map_or(0, LruCache::len)
    }
}
