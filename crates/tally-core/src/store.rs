//! Canonical keyed store of interaction state.
//!
//! The [`EntityStore`] is the only mutable shared resource of the engine.
//! It is written exclusively through [`seed`](EntityStore::seed),
//! [`apply_optimistic`](EntityStore::apply_optimistic),
//! [`commit`](EntityStore::commit) and [`revert`](EntityStore::revert) (plus
//! the authoritative variant of commit). Nothing here suspends or publishes;
//! callers fan out the returned state themselves.
//!
//! # Invariants
//!
//! 1. A new toggle supersedes the in-flight one: the optimistic value is
//!    computed from what is currently displayed, and the older sequence
//!    becomes stale.
//! 2. A resolution only applies when its sequence is the current one *and*
//!    a pending mutation for that sequence still exists. This makes every
//!    resolution idempotent and order-independent.
//! 3. Seeding never overwrites a slot that already has a baseline.
//!
//! # Failure Modes
//!
//! | Call | Situation | Behavior |
//! |------|-----------|----------|
//! | `apply_optimistic` | Entity never seeded | Seeded at zero/inactive, then toggled |
//! | `commit` / `revert` | Stale or repeated sequence | [`Resolution::Stale`], no change |
//! | `commit` / `revert` | Unknown entity | [`Resolution::Stale`], no change |
//! | `seed` | Slot already has a baseline | Returns `false`, no change |

use std::collections::HashMap;

use crate::guard;
use crate::id::{EntityId, InteractionKind};
use crate::state::{Authoritative, EntityInteractionState, PendingMutation};

/// Result of [`EntityStore::apply_optimistic`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Optimistic {
    /// Sequence number assigned to this toggle.
    pub sequence: u64,
    /// Entity state right after the toggle, ready to publish.
    pub state: EntityInteractionState,
}

/// Outcome of resolving a pending mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The optimistic value was kept. `corrected` is set when a server
    /// value replaced it.
    Committed { corrected: bool },
    /// The previous value was restored.
    Reverted,
    /// A newer toggle superseded this sequence, or it was already resolved.
    Stale,
}

impl Resolution {
    /// Whether the store changed.
    #[must_use]
    pub fn is_applied(self) -> bool {
        !matches!(self, Self::Stale)
    }
}

/// In-memory interaction state for every live entity.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: HashMap<EntityId, EntityInteractionState>,
}

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, entity: &EntityId) -> Option<&EntityInteractionState> {
        self.entities.get(entity)
    }

    #[must_use]
    pub fn contains(&self, entity: &EntityId) -> bool {
        self.entities.contains_key(entity)
    }

    /// Number of entities held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether any kind of `entity` has a mutation in flight.
    #[must_use]
    pub fn has_pending(&self, entity: &EntityId) -> bool {
        self.entities
            .get(entity)
            .is_some_and(EntityInteractionState::has_pending)
    }

    /// State for `entity`, created empty on first access.
    pub fn ensure(&mut self, entity: &EntityId) -> &EntityInteractionState {
        self.slot_entry(entity)
    }

    /// Put a previously removed state back (retention cache restore).
    ///
    /// Existing state wins; returns `false` if `entity` was already present.
    pub fn insert(&mut self, entity: EntityId, state: EntityInteractionState) -> bool {
        if self.entities.contains_key(&entity) {
            return false;
        }
        self.entities.insert(entity, state);
        true
    }

    /// Drop all state for `entity`.
    pub fn remove(&mut self, entity: &EntityId) -> Option<EntityInteractionState> {
        self.entities.remove(entity)
    }

    /// Set the baseline for `(entity, kind)` unless one already exists.
    ///
    /// Returns `true` if the baseline was written. A feed refresh arriving
    /// after the viewer already interacted is ignored.
    pub fn seed(
        &mut self,
        entity: &EntityId,
        kind: InteractionKind,
        initial_active: bool,
        initial_count: u64,
    ) -> bool {
        let slot = self.slot_entry(entity).kind_mut(kind);
        if slot.seeded {
            return false;
        }
        slot.set_displayed(guard::Displayed::new(initial_active, initial_count));
        slot.seeded = true;
        true
    }

    /// Toggle `(entity, kind)` optimistically.
    ///
    /// Captures the previous value in a [`PendingMutation`], replacing any
    /// older one, and bumps the sequence.
    pub fn apply_optimistic(&mut self, entity: &EntityId, kind: InteractionKind) -> Optimistic {
        let state = self.slot_entry(entity);
        let slot = state.kind_mut(kind);
        slot.seeded = true;

        let previous = slot.displayed();
        slot.sequence += 1;
        slot.pending = Some(PendingMutation {
            sequence_at_dispatch: slot.sequence,
            previous_active: previous.active,
            previous_count: previous.count,
        });
        slot.set_displayed(guard::toggled(kind, previous));
        let sequence = slot.sequence;

        Optimistic {
            sequence,
            state: state.clone(),
        }
    }

    /// Keep the optimistic value of `sequence`.
    pub fn commit(&mut self, entity: &EntityId, kind: InteractionKind, sequence: u64) -> Resolution {
        self.commit_authoritative(entity, kind, sequence, None)
    }

    /// Keep the optimistic value of `sequence`, replacing it with the server's
    /// value when one is given and it differs.
    ///
    /// The server value is discarded together with the commit when the
    /// sequence is stale.
    pub fn commit_authoritative(
        &mut self,
        entity: &EntityId,
        kind: InteractionKind,
        sequence: u64,
        remote: Option<Authoritative>,
    ) -> Resolution {
        let Some(slot) = self.entities.get_mut(entity).map(|s| s.kind_mut(kind)) else {
            return Resolution::Stale;
        };
        if slot.current_pending(sequence).is_none() {
            tracing::trace!(%entity, %kind, sequence, current = slot.sequence, "stale commit");
            return Resolution::Stale;
        }
        slot.pending = None;

        let optimistic = slot.displayed();
        let settled = remote.map_or(optimistic, |remote| guard::reconciled(optimistic, remote));
        slot.set_displayed(settled);
        Resolution::Committed {
            corrected: settled != optimistic,
        }
    }

    /// Undo the optimistic value of `sequence`.
    pub fn revert(&mut self, entity: &EntityId, kind: InteractionKind, sequence: u64) -> Resolution {
        let Some(slot) = self.entities.get_mut(entity).map(|s| s.kind_mut(kind)) else {
            return Resolution::Stale;
        };
        let Some(pending) = slot.current_pending(sequence) else {
            tracing::trace!(%entity, %kind, sequence, current = slot.sequence, "stale revert");
            return Resolution::Stale;
        };
        slot.pending = None;
        slot.set_displayed(pending.previous());
        Resolution::Reverted
    }

    fn slot_entry(&mut self, entity: &EntityId) -> &mut EntityInteractionState {
        self.entities.entry(entity.clone()).or_default()
    }
}
