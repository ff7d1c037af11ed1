#![forbid(unsafe_code)]

//! Property tests: arbitrary toggle bursts resolved in arbitrary order.

use proptest::prelude::*;
use tally_core::{Displayed, EntityId, InteractionKind, guard};
use tally_harness::{Recorder, Reply, ScriptedRepository, run_local, settle};
use tally_runtime::{EngineConfig, InteractionEngine, Subscription, ToggleTicket};

const SEED: [(InteractionKind, bool, u64); 4] = [
    (InteractionKind::Like, false, 3),
    (InteractionKind::Favorite, true, 1),
    (InteractionKind::Repost, false, 0),
    (InteractionKind::Follow, true, 0),
];

fn burst() -> impl Strategy<Value = (Vec<InteractionKind>, Vec<usize>, Vec<bool>)> {
    prop::collection::vec(prop::sample::select(InteractionKind::ALL.to_vec()), 1..12).prop_flat_map(
        |kinds| {
            let n = kinds.len();
            (
                Just(kinds),
                Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
                prop::collection::vec(any::<bool>(), n),
            )
        },
    )
}

struct Run {
    engine: InteractionEngine,
    feed: Recorder,
    detail: Recorder,
    _subscriptions: [Subscription; 2],
}

/// Dispatch `kinds` in order, then answer them in `order` with `succeed[i]`.
fn play(kinds: &[InteractionKind], order: &[usize], succeed: &[bool]) -> Run {
    run_local(async {
        let repo = ScriptedRepository::new();
        let engine = InteractionEngine::with_config(
            repo.clone(),
            EngineConfig::new().accept_authoritative(false),
        );
        let post = EntityId::post("p");
        for (kind, active, count) in SEED {
            engine.seed(&post, kind, active, count);
        }
        let feed = Recorder::new();
        let detail = Recorder::new();
        let feed_sub = engine.subscribe(&post, feed.listener());
        let detail_sub = engine.subscribe(&post, detail.listener());

        let mut tickets: Vec<Option<ToggleTicket>> = kinds
            .iter()
            .map(|&kind| Some(engine.toggle(&post, kind)))
            .collect();
        settle().await;

        for &i in order {
            let Some(ticket) = tickets[i].take() else {
                continue;
            };
            let reply = if succeed[i] {
                Reply::ok(true, 0)
            } else {
                Reply::network()
            };
            repo.respond(kinds[i], &post, ticket.sequence, reply);
            ticket.settled().await;
        }

        Run {
            engine,
            feed,
            detail,
            _subscriptions: [feed_sub, detail_sub],
        }
    })
}

fn expected_after_all(kind: InteractionKind, kinds: &[InteractionKind]) -> Displayed {
    let (_, active, count) = SEED[kind.index()];
    kinds
        .iter()
        .filter(|&&k| k == kind)
        .fold(Displayed::new(active, count), |acc, _| guard::toggled(kind, acc))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_toggle_resolves_exactly_once((kinds, order, succeed) in burst()) {
        let run = play(&kinds, &order, &succeed);
        let stats = run.engine.stats();
        prop_assert_eq!(stats.dispatched, kinds.len() as u64);
        prop_assert_eq!(stats.committed + stats.reverted + stats.stale, stats.dispatched);

        let state = run.engine.state(&EntityId::post("p")).unwrap();
        prop_assert!(!state.has_pending());
    }

    #[test]
    fn subscribers_observe_identical_sequences((kinds, order, succeed) in burst()) {
        let run = play(&kinds, &order, &succeed);
        prop_assert_eq!(run.feed.states(), run.detail.states());
        prop_assert_eq!(run.feed.last(), run.engine.state(&EntityId::post("p")));
    }

    #[test]
    fn all_successes_converge_to_latest_intent(
        (kinds, order, _succeed) in burst()
    ) {
        let all_ok = vec![true; kinds.len()];
        let run = play(&kinds, &order, &all_ok);
        let state = run.engine.state(&EntityId::post("p")).unwrap();
        for kind in InteractionKind::ALL {
            prop_assert_eq!(state.displayed(kind), expected_after_all(kind, &kinds));
        }
    }

    #[test]
    fn counts_stay_within_one_per_toggle_of_seed((kinds, order, succeed) in burst()) {
        let run = play(&kinds, &order, &succeed);
        for state in run.feed.states() {
            for (kind, slot) in state.iter() {
                let seed = SEED[kind.index()].2;
                let dispatched = kinds.iter().filter(|&&k| k == kind).count() as u64;
                prop_assert!(slot.count() <= seed + dispatched);
                prop_assert!(slot.count() >= seed.saturating_sub(dispatched));
            }
        }
    }
}
