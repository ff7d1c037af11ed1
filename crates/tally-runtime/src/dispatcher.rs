//! The toggle entry point.
//!
//! [`Dispatcher::toggle`] does three things in one tick: apply the toggle
//! optimistically in the store, publish the new state to every subscriber of
//! the entity, and hand the sequence to the [`Reconciler`]. It never touches
//! the network itself.

use std::rc::Rc;

use tally_core::{EntityId, EntityInteractionState, InteractionKind};
use tokio::sync::oneshot;

use crate::SharedStore;
use crate::bus::SubscriptionBus;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::stats::StatsCell;

/// What a toggle returns to the UI.
///
/// `state` is available immediately for synchronous feedback; `outcome`
/// resolves once the backend has answered and the answer was applied.
#[derive(Debug)]
pub struct ToggleTicket {
    /// Entity state right after the optimistic toggle.
    pub state: EntityInteractionState,
    /// Sequence number of this toggle for its `(entity, kind)`.
    pub sequence: u64,
    /// One-shot outcome signal. Awaiting it is optional.
    pub outcome: oneshot::Receiver<ReconcileOutcome>,
}

impl ToggleTicket {
    /// Wait for the outcome.
    ///
    /// Yields `None` only if the reconciliation task was torn down before
    /// resolving (the `LocalSet` was dropped).
    pub async fn settled(self) -> Option<ReconcileOutcome> {
        self.outcome.await.ok()
    }
}

/// Applies toggles and starts their reconciliation.
#[derive(Clone)]
pub struct Dispatcher {
    store: SharedStore,
    bus: SubscriptionBus,
    reconciler: Reconciler,
    stats: Rc<StatsCell>,
}

impl Dispatcher {
    pub(crate) fn new(
        store: SharedStore,
        bus: SubscriptionBus,
        reconciler: Reconciler,
        stats: Rc<StatsCell>,
    ) -> Self {
        Self {
            store,
            bus,
            reconciler,
            stats,
        }
    }

    /// Toggle `kind` on `entity`.
    ///
    /// An unknown entity is created and seeded at zero/inactive first.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio [`LocalSet`](tokio::task::LocalSet).
    pub fn toggle(&self, entity: &EntityId, kind: InteractionKind) -> ToggleTicket {
        let optimistic = self.store.borrow_mut().apply_optimistic(entity, kind);
        self.stats.dispatched();

        let displayed = optimistic.state.displayed(kind);
        tracing::debug!(
            %entity,
            %kind,
            sequence = optimistic.sequence,
            active = displayed.active,
            count = displayed.count,
            "optimistic toggle"
        );

        self.bus.publish(entity, &optimistic.state);
        let outcome = self
            .reconciler
            .start(entity.clone(), kind, optimistic.sequence);

        ToggleTicket {
            state: optimistic.state,
            sequence: optimistic.sequence,
            outcome,
        }
    }

    /// The reconciler this dispatcher hands off to.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("reconciler", &self.reconciler)
            .finish()
    }
}
