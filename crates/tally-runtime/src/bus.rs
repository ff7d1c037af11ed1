#![forbid(unsafe_code)]

//! Per-entity fan-out of interaction state.
//!
//! The [`SubscriptionBus`] maps an [`EntityId`] to the listeners of every
//! screen currently showing that entity. After each store mutation the caller
//! publishes the new snapshot once and every listener receives the same value.
//!
//! # Architecture
//!
//! Listeners are stored as `Weak` callbacks; the strong reference lives in the
//! [`Subscription`] handed back to the caller. Dropping the subscription
//! removes the listener right away; listeners whose strong side vanished any
//! other way are cleaned up lazily during publish.
//!
//! # Invariants
//!
//! 1. Listeners are notified in registration order.
//! 2. No bus borrow is held while a listener runs, so a listener may
//!    subscribe, unsubscribe or toggle from inside its callback.
//! 3. The release hook fires exactly once each time an entity's listener
//!    count drops to zero.
//! 4. Dropping a [`SubscriptionScope`] releases all of its subscriptions.
//!
//! # Failure Modes
//!
//! - Publishing to an entity nobody listens to is a no-op returning `0`.
//! - A `Subscription` outliving its bus drops silently.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tally_core::{EntityId, EntityInteractionState};

use crate::engine::InteractionEngine;

type Callback = dyn Fn(&EntityInteractionState);
type ReleaseHook = dyn Fn(&EntityId);

struct Listener {
    id: u64,
    callback: Weak<Callback>,
}

#[derive(Default)]
struct BusInner {
    listeners: HashMap<EntityId, Vec<Listener>>,
    next_id: u64,
    release_hook: Option<Rc<ReleaseHook>>,
}

/// Fan-out of entity state snapshots to UI listeners.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct SubscriptionBus {
    inner: Rc<RefCell<BusInner>>,
}

impl SubscriptionBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the callback run when the last listener of an entity goes away.
    ///
    /// Replaces any previously installed hook.
    pub fn on_release(&self, hook: impl Fn(&EntityId) + 'static) {
        self.inner.borrow_mut().release_hook = Some(Rc::new(hook));
    }

    /// Register `listener` for `entity`.
    ///
    /// The listener is not called here; it sees the next [`publish`](Self::publish).
    #[must_use = "dropping a Subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        entity: &EntityId,
        listener: impl Fn(&EntityInteractionState) + 'static,
    ) -> Subscription {
        let callback: Rc<Callback> = Rc::new(listener);
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .listeners
            .entry(entity.clone())
            .or_default()
            .push(Listener {
                id,
                callback: Rc::downgrade(&callback),
            });
        tracing::trace!(%entity, listener = id, "subscribed");

        Subscription {
            entity: entity.clone(),
            id,
            bus: Rc::downgrade(&self.inner),
            _callback: callback,
        }
    }

    /// Deliver `state` to every live listener of `entity`.
    ///
    /// Returns the number of listeners notified.
    pub fn publish(&self, entity: &EntityId, state: &EntityInteractionState) -> usize {
        let callbacks: Vec<Rc<Callback>> = {
            let mut inner = self.inner.borrow_mut();
            let Some(list) = inner.listeners.get_mut(entity) else {
                return 0;
            };
            list.retain(|l| l.callback.strong_count() > 0);
            list.iter().filter_map(|l| l.callback.upgrade()).collect()
        };

        for callback in &callbacks {
            callback(state);
        }
        callbacks.len()
    }

    /// Number of live listeners for `entity`.
    #[must_use]
    pub fn subscriber_count(&self, entity: &EntityId) -> usize {
        self.inner.borrow().listeners.get(entity).map_or(0, |list| {
            list.iter().filter(|l| l.callback.strong_count() > 0).count()
        })
    }

    /// Number of entities with at least one registered listener.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }
}

impl std::fmt::Debug for SubscriptionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionBus")
            .field("entities", &self.entity_count())
            .finish()
    }
}

/// RAII guard for one listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    entity: EntityId,
    id: u64,
    bus: Weak<RefCell<BusInner>>,
    _callback: Rc<Callback>,
}

impl Subscription {
    /// The entity this subscription listens to.
    #[must_use]
    pub fn entity(&self) -> &EntityId {
        &self.entity
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let hook = {
            let mut inner = bus.borrow_mut();
            let Some(list) = inner.listeners.get_mut(&self.entity) else {
                return;
            };
            list.retain(|l| l.id != self.id && l.callback.strong_count() > 0);
            if !list.is_empty() {
                return;
            }
            inner.listeners.remove(&self.entity);
            inner.release_hook.clone()
        };
        tracing::trace!(entity = %self.entity, "last listener released");
        if let Some(hook) = hook {
            hook(&self.entity);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("entity", &self.entity)
            .field("id", &self.id)
            .finish()
    }
}

/// Collects the subscriptions of one screen or component.
///
/// When the scope is dropped, every held subscription is released and the
/// screen stops receiving updates.
///
/// # Usage
///
/// ```ignore
/// let mut scope = SubscriptionScope::new();
/// scope.subscribe(&engine, &post, |state| render_like_button(state));
/// scope.subscribe(&engine, &author, |state| render_follow_button(state));
/// // Navigating away drops the scope.
/// ```
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Keep `sub` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Subscribe through `engine` and hold the result.
    ///
    /// Returns the scope for chaining.
    pub fn subscribe(
        &mut self,
        engine: &InteractionEngine,
        entity: &EntityId,
        on_change: impl Fn(&EntityInteractionState) + 'static,
    ) -> &mut Self {
        let sub = engine.subscribe(entity, on_change);
        self.subscriptions.push(sub);
        self
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release all subscriptions now; the scope stays usable.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

impl Default for SubscriptionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("subscription_count", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tally_core::{EntityStore, InteractionKind};

    fn sample_state(count: u64) -> EntityInteractionState {
        let mut store = EntityStore::new();
        let id = EntityId::post("sample");
        store.seed(&id, InteractionKind::Like, false, count);
        store.get(&id).cloned().unwrap()
    }

    #[test]
    fn publish_reaches_all_listeners() {
        let bus = SubscriptionBus::new();
        let id = EntityId::post("1");
        let seen = Rc::new(Cell::new(0u64));

        let s1 = Rc::clone(&seen);
        let _a = bus.subscribe(&id, move |st| s1.set(s1.get() + st.count(InteractionKind::Like)));
        let s2 = Rc::clone(&seen);
        let _b = bus.subscribe(&id, move |st| s2.set(s2.get() + st.count(InteractionKind::Like)));

        assert_eq!(bus.publish(&id, &sample_state(5)), 2);
        assert_eq!(seen.get(), 10);
    }

    #[test]
    fn publish_is_scoped_to_entity() {
        let bus = SubscriptionBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = bus.subscribe(&EntityId::post("a"), move |_| h.set(h.get() + 1));

        assert_eq!(bus.publish(&EntityId::post("b"), &sample_state(1)), 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn listeners_notified_in_registration_order() {
        let bus = SubscriptionBus::new();
        let id = EntityId::post("1");
        let order = Rc::new(RefCell::new(Vec::new()));

        let subs: Vec<_> = (0..3)
            .map(|i| {
                let o = Rc::clone(&order);
                bus.subscribe(&id, move |_| o.borrow_mut().push(i))
            })
            .collect();

        bus.publish(&id, &sample_state(0));
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        drop(subs);
    }

    #[test]
    fn drop_unsubscribes() {
        let bus = SubscriptionBus::new();
        let id = EntityId::post("1");
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = bus.subscribe(&id, move |_| h.set(h.get() + 1));
        assert_eq!(bus.subscriber_count(&id), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(&id), 0);
        assert_eq!(bus.publish(&id, &sample_state(0)), 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn release_hook_fires_on_last_drop_only() {
        let bus = SubscriptionBus::new();
        let id = EntityId::post("1");
        let released = Rc::new(RefCell::new(Vec::new()));
        let r = Rc::clone(&released);
        bus.on_release(move |entity| r.borrow_mut().push(entity.clone()));

        let a = bus.subscribe(&id, |_| {});
        let b = bus.subscribe(&id, |_| {});
        drop(a);
        assert!(released.borrow().is_empty());
        drop(b);
        assert_eq!(*released.borrow(), vec![id.clone()]);
        assert_eq!(bus.entity_count(), 0);
    }

    #[test]
    fn listener_may_unsubscribe_during_publish() {
        let bus = SubscriptionBus::new();
        let id = EntityId::post("1");
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let s = Rc::clone(&slot);
        let sub = bus.subscribe(&id, move |_| {
            s.borrow_mut().take();
        });
        *slot.borrow_mut() = Some(sub);

        assert_eq!(bus.publish(&id, &sample_state(0)), 1);
        assert!(slot.borrow().is_none());
        assert_eq!(bus.subscriber_count(&id), 0);
    }

    #[test]
    fn subscription_outliving_bus_drops_quietly() {
        let bus = SubscriptionBus::new();
        let sub = bus.subscribe(&EntityId::post("1"), |_| {});
        drop(bus);
        drop(sub);
    }

    #[test]
    fn scope_hold_and_clear() {
        let bus = SubscriptionBus::new();
        let id = EntityId::post("1");
        let mut scope = SubscriptionScope::new();
        scope.hold(bus.subscribe(&id, |_| {}));
        scope.hold(bus.subscribe(&id, |_| {}));
        assert_eq!(scope.len(), 2);
        assert_eq!(bus.subscriber_count(&id), 2);

        scope.clear();
        assert!(scope.is_empty());
        assert_eq!(bus.subscriber_count(&id), 0);
    }

    #[test]
    fn scope_drop_releases() {
        let bus = SubscriptionBus::new();
        let id = EntityId::post("1");
        {
            let mut scope = SubscriptionScope::new();
            scope.hold(bus.subscribe(&id, |_| {}));
            assert_eq!(bus.subscriber_count(&id), 1);
        }
        assert_eq!(bus.subscriber_count(&id), 0);
    }

    #[test]
    fn scope_debug_format() {
        let bus = SubscriptionBus::new();
        let mut scope = SubscriptionScope::new();
        scope.hold(bus.subscribe(&EntityId::post("1"), |_| {}));
        let debug = format!("{scope:?}");
        assert!(debug.contains("subscription_count: 1"));
    }
}
