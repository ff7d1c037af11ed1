#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tally_core::{Authoritative, Displayed, EntityId, EntityStore, InteractionKind, Resolution};

#[derive(Arbitrary, Debug)]
enum Op {
    Seed { entity: u8, kind: u8, active: bool, count: u32 },
    Toggle { entity: u8, kind: u8 },
    Commit { entity: u8, kind: u8, back: u8 },
    Revert { entity: u8, kind: u8, back: u8 },
    Authoritative { entity: u8, kind: u8, back: u8, active: Option<bool>, count: Option<i64> },
    Remove { entity: u8 },
}

fn entity(raw: u8) -> EntityId {
    EntityId::post((raw % 4).to_string())
}

fn kind(raw: u8) -> InteractionKind {
    InteractionKind::ALL[raw as usize % InteractionKind::COUNT]
}

type Slot = (EntityId, InteractionKind);

fuzz_target!(|ops: Vec<Op>| {
    if ops.len() > 512 {
        return;
    }
    let mut store = EntityStore::new();
    // Value shown before each dispatched sequence, for checking reverts.
    let mut before: HashMap<(Slot, u64), Displayed> = HashMap::new();
    let mut resolved: HashMap<Slot, Vec<u64>> = HashMap::new();

    for op in ops {
        match op {
            Op::Seed { entity: e, kind: k, active, count } => {
                store.seed(&entity(e), kind(k), active, u64::from(count));
            }
            Op::Toggle { entity: e, kind: k } => {
                let (id, kind) = (entity(e), kind(k));
                let prior = store.get(&id).map(|s| s.displayed(kind)).unwrap_or_default();
                let optimistic = store.apply_optimistic(&id, kind);
                before.insert(((id, kind), optimistic.sequence), prior);
            }
            Op::Commit { entity: e, kind: k, back } => {
                resolve(&mut store, &mut resolved, &before, entity(e), kind(k), back, None, false);
            }
            Op::Revert { entity: e, kind: k, back } => {
                resolve(&mut store, &mut resolved, &before, entity(e), kind(k), back, None, true);
            }
            Op::Authoritative { entity: e, kind: k, back, active, count } => {
                let remote = Some(Authoritative::new(active, count));
                resolve(&mut store, &mut resolved, &before, entity(e), kind(k), back, remote, false);
            }
            Op::Remove { entity: e } => {
                let id = entity(e);
                if !store.has_pending(&id) && store.remove(&id).is_some() {
                    // Sequences restart for a re-created entity.
                    resolved.retain(|(slot_id, _), _| slot_id != &id);
                    before.retain(|((slot_id, _), _), _| slot_id != &id);
                }
            }
        }
    }
});

#[allow(clippy::too_many_arguments)]
fn resolve(
    store: &mut EntityStore,
    resolved: &mut HashMap<Slot, Vec<u64>>,
    before: &HashMap<(Slot, u64), Displayed>,
    id: EntityId,
    kind: InteractionKind,
    back: u8,
    remote: Option<Authoritative>,
    revert: bool,
) {
    let current = store.get(&id).map_or(0, |s| s.sequence(kind));
    let sequence = current.saturating_sub(u64::from(back % 3));
    let slot = (id.clone(), kind);

    let resolution = if revert {
        store.revert(&id, kind, sequence)
    } else {
        store.commit_authoritative(&id, kind, sequence, remote)
    };

    let seen = resolved.entry(slot.clone()).or_default();
    if resolution.is_applied() {
        assert_eq!(sequence, current, "only the latest sequence may resolve");
        assert!(!seen.contains(&sequence), "sequence {sequence} resolved twice");
        seen.push(sequence);

        let state = store.get(&id).expect("resolved entity is present");
        assert!(!state.is_pending(kind));
        if resolution == Resolution::Reverted {
            let prior = before.get(&(slot, sequence)).copied().unwrap_or_default();
            assert_eq!(state.displayed(kind), prior);
        }
    }
}
