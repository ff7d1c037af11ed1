//! Per-entity interaction state.
//!
//! [`EntityInteractionState`] keeps one [`KindState`] slot per
//! [`InteractionKind`]. Slots are only written by
//! [`EntityStore`](crate::store::EntityStore); everything handed to UI code is
//! a clone.
//!
//! # Invariants
//!
//! 1. `count` is unsigned, so a displayed counter is never negative.
//! 2. `pending`, when present, always carries the current `sequence`. Any
//!    other sequence number is stale.
//! 3. `active` and `count` are only changed together, through
//!    [`guard`](crate::guard).

use crate::guard::Displayed;
use crate::id::InteractionKind;

/// Snapshot of an optimistic mutation that has not been confirmed yet.
///
/// Holds exactly what is needed to undo it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PendingMutation {
    /// Sequence number assigned when the toggle was dispatched.
    pub sequence_at_dispatch: u64,
    /// `active` before the toggle.
    pub previous_active: bool,
    /// `count` before the toggle.
    pub previous_count: u64,
}

impl PendingMutation {
    /// Displayed value to restore on revert.
    #[must_use]
    pub fn previous(&self) -> Displayed {
        Displayed::new(self.previous_active, self.previous_count)
    }
}

/// State of one interaction kind on one entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KindState {
    pub(crate) count: u64,
    pub(crate) active: bool,
    pub(crate) pending: Option<PendingMutation>,
    pub(crate) sequence: u64,
    pub(crate) seeded: bool,
}

impl KindState {
    /// Displayed counter.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether the viewer has this interaction switched on.
    ///
    /// Unused for reposts, which only count.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The in-flight mutation, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&PendingMutation> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of toggles dispatched for this kind so far.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Whether a baseline exists (from a seed, a toggle, or the server).
    #[must_use]
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// The `(active, count)` pair shown to the viewer.
    #[must_use]
    pub fn displayed(&self) -> Displayed {
        Displayed::new(self.active, self.count)
    }

    pub(crate) fn set_displayed(&mut self, displayed: Displayed) {
        self.active = displayed.active;
        self.count = displayed.count;
    }

    /// The pending mutation, but only if it belongs to `sequence` and nothing
    /// newer has been dispatched since.
    pub(crate) fn current_pending(&self, sequence: u64) -> Option<PendingMutation> {
        self.pending
            .filter(|p| p.sequence_at_dispatch == sequence && self.sequence == sequence)
    }
}

/// Interaction state of a single entity across all kinds.
///
/// This is the snapshot subscribers receive: two subscribers of the same
/// entity always get equal values after a mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityInteractionState {
    kinds: [KindState; InteractionKind::COUNT],
}

impl EntityInteractionState {
    /// A state with every kind unseeded (zero, inactive, nothing pending).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn kind(&self, kind: InteractionKind) -> &KindState {
        &self.kinds[kind.index()]
    }

    pub(crate) fn kind_mut(&mut self, kind: InteractionKind) -> &mut KindState {
        &mut self.kinds[kind.index()]
    }

    #[must_use]
    pub fn count(&self, kind: InteractionKind) -> u64 {
        self.kind(kind).count
    }

    #[must_use]
    pub fn is_active(&self, kind: InteractionKind) -> bool {
        self.kind(kind).active
    }

    #[must_use]
    pub fn is_pending(&self, kind: InteractionKind) -> bool {
        self.kind(kind).pending.is_some()
    }

    #[must_use]
    pub fn sequence(&self, kind: InteractionKind) -> u64 {
        self.kind(kind).sequence
    }

    #[must_use]
    pub fn displayed(&self, kind: InteractionKind) -> Displayed {
        self.kind(kind).displayed()
    }

    /// Whether any kind still has a mutation in flight.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.kinds.iter().any(KindState::is_pending)
    }

    /// Iterate `(kind, state)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (InteractionKind, &KindState)> {
        InteractionKind::ALL.into_iter().zip(self.kinds.iter())
    }
}

/// Server-reported value for one kind, as returned by the backend.
///
/// Fields the backend does not report are `None` and leave the local value
/// untouched. Counts are signed because they come straight off the wire; the
/// guard clamps them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Authoritative {
    pub active: Option<bool>,
    pub count: Option<i64>,
}

impl Authoritative {
    #[must_use]
    pub fn new(active: Option<bool>, count: Option<i64>) -> Self {
        Self { active, count }
    }

    /// Server reported nothing beyond success.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}
