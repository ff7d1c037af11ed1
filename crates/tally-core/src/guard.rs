//! Counter arithmetic shared by every store mutation.
//!
//! All functions here are pure. The store never adjusts a counter inline; it
//! asks the guard for the next `(active, count)` pair and writes both fields
//! at once.
//!
//! # Invariants
//!
//! 1. **Non-negative**: counts are `u64` and decrements saturate at zero.
//!    Server counts below zero clamp to zero.
//! 2. **Paired**: `active` and `count` always move together for toggleable
//!    kinds; deactivating never leaves the count raised.
//! 3. **Repost is monotonic**: a repost only ever adds one and never touches
//!    `active`.

use crate::id::InteractionKind;
use crate::state::Authoritative;

/// The `(active, count)` pair a viewer sees for one kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Displayed {
    pub active: bool,
    pub count: u64,
}

impl Displayed {
    #[must_use]
    pub const fn new(active: bool, count: u64) -> Self {
        Self { active, count }
    }
}

/// Value shown after the viewer toggles `kind` from `current`.
///
/// Activating adds one, deactivating removes one (never below zero).
/// Reposts always add one.
#[must_use]
pub fn toggled(kind: InteractionKind, current: Displayed) -> Displayed {
    if !kind.is_toggleable() {
        return Displayed::new(current.active, current.count.saturating_add(1));
    }
    if current.active {
        Displayed::new(false, current.count.saturating_sub(1))
    } else {
        Displayed::new(true, current.count.saturating_add(1))
    }
}

/// Clamp a wire count into the displayable range.
#[inline]
#[must_use]
pub fn clamp_count(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

/// Merge a server report into the locally displayed value.
///
/// Fields the server did not report keep their local value.
#[must_use]
pub fn reconciled(current: Displayed, remote: Authoritative) -> Displayed {
    Displayed::new(
        remote.active.unwrap_or(current.active),
        remote.count.map_or(current.count, clamp_count),
    )
}
