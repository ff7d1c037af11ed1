//! Resolution of optimistic mutations against the backend.
//!
//! The [`Reconciler`] owns one in-flight record per `(entity, kind)`. Starting
//! a new request for a pair replaces the record; the older request keeps
//! running (nothing is aborted at the transport level) but its answer is
//! stale by the time it arrives and the store ignores it.
//!
//! # Resolution rules
//!
//! | Response | Sequence still current? | Effect |
//! |----------|-------------------------|--------|
//! | `Ok` | yes | commit, server value overwrites if it differs |
//! | `Ok` | no | dropped |
//! | `Err` | yes | revert, caller receives the error |
//! | `Err` | no | dropped |
//!
//! Responses for entities that lost all subscribers mid-flight are still
//! applied; the entity is evicted right after if nobody came back. Entities
//! that never had a subscriber stay in the store.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tally_core::{Authoritative, EntityId, InteractionKind, Resolution};
use tokio::sync::oneshot;
use tracing::Instrument;

use crate::SharedStore;
use crate::bus::SubscriptionBus;
use crate::repository::{self, Repository, RepositoryError};
use crate::retention::Retention;
use crate::stats::StatsCell;

/// What became of one toggle once its response arrived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The backend confirmed. `corrected` is set when its value replaced the
    /// optimistic one.
    Committed { corrected: bool },
    /// The backend failed and the toggle was undone. Suitable for a toast.
    Reverted(RepositoryError),
    /// A newer toggle superseded this one; nothing changed.
    Stale,
}

impl ReconcileOutcome {
    /// The error to surface to the viewer, if any.
    #[must_use]
    pub fn error(&self) -> Option<&RepositoryError> {
        match self {
            Self::Reverted(err) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }
}

struct ReconcilerInner {
    store: SharedStore,
    bus: SubscriptionBus,
    retention: Rc<Retention>,
    repository: Rc<dyn Repository>,
    in_flight: RefCell<HashMap<(EntityId, InteractionKind), u64>>,
    stats: Rc<StatsCell>,
    accept_authoritative: bool,
}

/// Bridges optimistic mutations to the [`Repository`].
///
/// Cloning yields another handle to the same reconciler.
#[derive(Clone)]
pub struct Reconciler {
    inner: Rc<ReconcilerInner>,
}

impl Reconciler {
    pub(crate) fn new(
        store: SharedStore,
        bus: SubscriptionBus,
        retention: Rc<Retention>,
        repository: Rc<dyn Repository>,
        stats: Rc<StatsCell>,
        accept_authoritative: bool,
    ) -> Self {
        Self {
            inner: Rc::new(ReconcilerInner {
                store,
                bus,
                retention,
                repository,
                in_flight: RefCell::new(HashMap::new()),
                stats,
                accept_authoritative,
            }),
        }
    }

    /// Issue the repository call for `sequence` on the current `LocalSet`.
    ///
    /// The returned receiver yields the outcome once the response has been
    /// applied. Dropping it is fine; the response is applied regardless.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio [`LocalSet`](tokio::task::LocalSet).
    pub fn start(
        &self,
        entity: EntityId,
        kind: InteractionKind,
        sequence: u64,
    ) -> oneshot::Receiver<ReconcileOutcome> {
        let (tx, rx) = oneshot::channel();

        let superseded = self
            .inner
            .in_flight
            .borrow_mut()
            .insert((entity.clone(), kind), sequence);
        if let Some(previous) = superseded {
            tracing::debug!(%entity, %kind, previous, sequence, "superseding in-flight request");
        }

        let span = tracing::debug_span!("reconcile", %entity, %kind, sequence);
        let this = self.clone();
        tokio::task::spawn_local(
            async move {
                let repo = Rc::clone(&this.inner.repository);
                let result = repository::request(repo.as_ref(), kind, &entity, sequence).await;
                let outcome = this.resolve(&entity, kind, sequence, result);
                // The caller may have dropped the ticket.
                let _ = tx.send(outcome);
            }
            .instrument(span),
        );
        rx
    }

    /// Apply a repository result for `sequence` to the store and publish.
    ///
    /// Safe to call any number of times, in any order: only the first
    /// resolution of the current sequence changes anything.
    pub fn resolve(
        &self,
        entity: &EntityId,
        kind: InteractionKind,
        sequence: u64,
        result: Result<Authoritative, RepositoryError>,
    ) -> ReconcileOutcome {
        let inner = &self.inner;
        {
            let mut in_flight = inner.in_flight.borrow_mut();
            let key = (entity.clone(), kind);
            if in_flight.get(&key) == Some(&sequence) {
                in_flight.remove(&key);
            }
        }

        let (outcome, published) = {
            let mut store = inner.store.borrow_mut();
            let outcome = match result {
                Ok(remote) => {
                    let remote = inner.accept_authoritative.then_some(remote);
                    match store.commit_authoritative(entity, kind, sequence, remote) {
                        Resolution::Committed { corrected } => {
                            ReconcileOutcome::Committed { corrected }
                        }
                        _ => ReconcileOutcome::Stale,
                    }
                }
                Err(err) => match store.revert(entity, kind, sequence) {
                    Resolution::Reverted => ReconcileOutcome::Reverted(err),
                    _ => ReconcileOutcome::Stale,
                },
            };
            let published = if outcome.is_stale() {
                None
            } else {
                store.get(entity).cloned()
            };
            (outcome, published)
        };
        if let Some(state) = published {
            inner.bus.publish(entity, &state);
        }

        match &outcome {
            ReconcileOutcome::Committed { corrected } => {
                inner.stats.committed(*corrected);
                tracing::debug!(%entity, %kind, sequence, corrected = *corrected, "committed");
            }
            ReconcileOutcome::Reverted(err) => {
                inner.stats.reverted();
                tracing::warn!(%entity, %kind, sequence, error = %err, "request failed, reverted");
            }
            ReconcileOutcome::Stale => {
                inner.stats.stale();
                tracing::debug!(%entity, %kind, sequence, "stale response dropped");
            }
        }

        if inner.bus.subscriber_count(entity) == 0 {
            inner.retention.release_deferred(entity);
        }
        outcome
    }

    /// Latest dispatched sequence still awaiting a response for the pair.
    #[must_use]
    pub fn in_flight(&self, entity: &EntityId, kind: InteractionKind) -> Option<u64> {
        self.inner
            .in_flight
            .borrow()
            .get(&(entity.clone(), kind))
            .copied()
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("in_flight", &self.inner.in_flight.borrow().len())
            .field("accept_authoritative", &self.inner.accept_authoritative)
            .finish()
    }
}
