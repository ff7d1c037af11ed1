//! Counters describing what the engine has done this session.

use std::cell::Cell;

/// Point-in-time copy of the engine counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Toggles dispatched.
    pub dispatched: u64,
    /// Resolutions that kept the optimistic value.
    pub committed: u64,
    /// Commits where the server value replaced the optimistic one.
    pub corrected: u64,
    /// Failed requests that restored the previous value.
    pub reverted: u64,
    /// Responses dropped because a newer toggle superseded them.
    pub stale: u64,
    /// Entities dropped from the store after their last subscriber left.
    pub evicted: u64,
    /// Entities brought back from the retention cache.
    pub restored: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCell {
    dispatched: Cell<u64>,
    committed: Cell<u64>,
    corrected: Cell<u64>,
    reverted: Cell<u64>,
    stale: Cell<u64>,
    evicted: Cell<u64>,
    restored: Cell<u64>,
}

fn bump(cell: &Cell<u64>) {
    cell.set(cell.get().saturating_add(1));
}

impl StatsCell {
    pub(crate) fn dispatched(&self) {
        bump(&self.dispatched);
    }

    pub(crate) fn committed(&self, corrected: bool) {
        bump(&self.committed);
        if corrected {
            bump(&self.corrected);
        }
    }

    pub(crate) fn reverted(&self) {
        bump(&self.reverted);
    }

    pub(crate) fn stale(&self) {
        bump(&self.stale);
    }

    pub(crate) fn evicted(&self) {
        bump(&self.evicted);
    }

    pub(crate) fn restored(&self) {
        bump(&self.restored);
    }

    pub(crate) fn snapshot(&self) -> EngineStats {
        EngineStats {
            dispatched: self.dispatched.get(),
            committed: self.committed.get(),
            corrected: self.corrected.get(),
            reverted: self.reverted.get(),
            stale: self.stale.get(),
            evicted: self.evicted.get(),
            restored: self.restored.get(),
        }
    }
}
