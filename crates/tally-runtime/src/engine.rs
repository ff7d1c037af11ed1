//! The object UI code holds.
//!
//! [`InteractionEngine`] wires the store, bus, dispatcher and reconciler
//! together and exposes the binding contract screens use:
//!
//! - [`subscribe`](InteractionEngine::subscribe) to an entity and get its
//!   current state plus every later change,
//! - [`toggle`](InteractionEngine::toggle) an interaction with immediate
//!   optimistic feedback,
//! - [`seed`](InteractionEngine::seed) baselines from feed payloads.
//!
//! # Example
//!
//! ```ignore
//! let engine = InteractionEngine::new(HttpRepository::new(client));
//! let post = EntityId::post("1");
//! engine.seed(&post, InteractionKind::Like, false, 3);
//!
//! let _sub = engine.subscribe(&post, |state| like_button.render(state));
//! let ticket = engine.toggle(&post, InteractionKind::Like);
//! assert_eq!(ticket.state.count(InteractionKind::Like), 4);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tally_core::{EntityId, EntityInteractionState, EntityStore, InteractionKind};

use crate::SharedStore;
use crate::bus::{Subscription, SubscriptionBus};
use crate::config::EngineConfig;
use crate::dispatcher::{Dispatcher, ToggleTicket};
use crate::reconciler::Reconciler;
use crate::repository::Repository;
use crate::retention::Retention;
use crate::stats::{EngineStats, StatsCell};

/// Baseline for one kind as carried by a feed payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSnapshot {
    #[serde(default)]
    pub active: bool,
    pub count: u64,
}

/// Baselines for several kinds of one entity, e.g. a post in a feed page.
///
/// Kinds left `None` are not seeded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSnapshot {
    pub like: Option<KindSnapshot>,
    pub favorite: Option<KindSnapshot>,
    pub repost: Option<KindSnapshot>,
    pub follow: Option<KindSnapshot>,
}

impl InteractionSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the baseline for `kind`.
    #[must_use]
    pub fn with(mut self, kind: InteractionKind, active: bool, count: u64) -> Self {
        *self.slot_mut(kind) = Some(KindSnapshot { active, count });
        self
    }

    #[must_use]
    pub fn get(&self, kind: InteractionKind) -> Option<KindSnapshot> {
        match kind {
            InteractionKind::Like => self.like,
            InteractionKind::Favorite => self.favorite,
            InteractionKind::Repost => self.repost,
            InteractionKind::Follow => self.follow,
        }
    }

    fn slot_mut(&mut self, kind: InteractionKind) -> &mut Option<KindSnapshot> {
        match kind {
            InteractionKind::Like => &mut self.like,
            InteractionKind::Favorite => &mut self.favorite,
            InteractionKind::Repost => &mut self.repost,
            InteractionKind::Follow => &mut self.follow,
        }
    }
}

/// Single source of truth for interaction state, shared by every screen.
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct InteractionEngine {
    store: SharedStore,
    bus: SubscriptionBus,
    dispatcher: Dispatcher,
    retention: Rc<Retention>,
    stats: Rc<StatsCell>,
    config: Rc<EngineConfig>,
}

impl InteractionEngine {
    /// Engine with the default [`EngineConfig`].
    #[must_use]
    pub fn new(repository: impl Repository + 'static) -> Self {
        Self::with_config(repository, EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(repository: impl Repository + 'static, config: EngineConfig) -> Self {
        Self::from_shared(Rc::new(repository), config)
    }

    /// Engine over a repository the caller keeps a handle to.
    #[must_use]
    pub fn from_shared(repository: Rc<dyn Repository>, config: EngineConfig) -> Self {
        let store: SharedStore = Rc::new(RefCell::new(EntityStore::new()));
        let stats = Rc::new(StatsCell::default());
        let bus = SubscriptionBus::new();
        let retention = Rc::new(Retention::new(
            Rc::clone(&store),
            config.retention(),
            Rc::clone(&stats),
        ));

        let on_release = Rc::clone(&retention);
        bus.on_release(move |entity| {
            on_release.release(entity);
        });

        let reconciler = Reconciler::new(
            Rc::clone(&store),
            bus.clone(),
            Rc::clone(&retention),
            repository,
            Rc::clone(&stats),
            config.accept_authoritative,
        );
        let dispatcher = Dispatcher::new(Rc::clone(&store), bus.clone(), reconciler, Rc::clone(&stats));

        tracing::debug!(?config, "interaction engine created");
        Self {
            store,
            bus,
            dispatcher,
            retention,
            stats,
            config: Rc::new(config),
        }
    }

    /// Listen to `entity`.
    ///
    /// `on_change` is called once right away with the current state (created
    /// empty if the entity is unknown) and again after every mutation.
    #[must_use = "dropping a Subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        entity: &EntityId,
        on_change: impl Fn(&EntityInteractionState) + 'static,
    ) -> Subscription {
        self.retention.attach(entity);
        let current = self.store.borrow_mut().ensure(entity).clone();

        let on_change = Rc::new(on_change);
        let listener = Rc::clone(&on_change);
        let sub = self.bus.subscribe(entity, move |state| listener(state));
        on_change(&current);
        sub
    }

    /// Toggle `kind` on `entity` optimistically and start reconciling it.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio [`LocalSet`](tokio::task::LocalSet).
    pub fn toggle(&self, entity: &EntityId, kind: InteractionKind) -> ToggleTicket {
        self.retention.restore(entity);
        self.dispatcher.toggle(entity, kind)
    }

    /// Seed the baseline for `(entity, kind)`.
    ///
    /// Ignored if the slot already has one (a late feed refresh never
    /// clobbers an interaction). Returns whether the baseline was written.
    pub fn seed(
        &self,
        entity: &EntityId,
        kind: InteractionKind,
        initial_active: bool,
        initial_count: u64,
    ) -> bool {
        let snapshot = InteractionSnapshot::new().with(kind, initial_active, initial_count);
        self.seed_snapshot(entity, &snapshot) == 1
    }

    /// Seed every kind present in `snapshot`, publishing once.
    ///
    /// Returns the number of kinds that were written.
    pub fn seed_snapshot(&self, entity: &EntityId, snapshot: &InteractionSnapshot) -> usize {
        self.retention.restore(entity);
        let (written, published) = {
            let mut store = self.store.borrow_mut();
            let written = InteractionKind::ALL
                .into_iter()
                .filter_map(|kind| snapshot.get(kind).map(|s| (kind, s)))
                .filter(|(kind, s)| store.seed(entity, *kind, s.active, s.count))
                .count();
            let published = if written > 0 {
                store.get(entity).cloned()
            } else {
                None
            };
            (written, published)
        };

        if let Some(state) = published {
            tracing::trace!(%entity, kinds = written, "seeded");
            self.bus.publish(entity, &state);
        }
        written
    }

    /// Current state of `entity`, if the store holds it.
    #[must_use]
    pub fn state(&self, entity: &EntityId) -> Option<EntityInteractionState> {
        self.store.borrow().get(entity).cloned()
    }

    #[must_use]
    pub fn subscriber_count(&self, entity: &EntityId) -> usize {
        self.bus.subscriber_count(entity)
    }

    /// Number of entities currently held in the store.
    #[must_use]
    pub fn live_entities(&self) -> usize {
        self.store.borrow().len()
    }

    /// Number of evicted entities remembered by the retention cache.
    #[must_use]
    pub fn retained_entities(&self) -> usize {
        self.retention.retained()
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot()
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        self.dispatcher.reconciler()
    }
}

impl std::fmt::Debug for InteractionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionEngine")
            .field("live_entities", &self.live_entities())
            .field("bus", &self.bus)
            .field("config", &self.config)
            .finish()
    }
}
