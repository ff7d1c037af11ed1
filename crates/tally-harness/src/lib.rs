#![forbid(unsafe_code)]

//! Test harness for Tally.
//!
//! - [`ScriptedRepository`]: a [`Repository`] whose responses the test
//!   releases by hand, in any order, so out-of-order and superseded
//!   responses can be replayed deterministically.
//! - [`Recorder`]: a subscriber that keeps every state it was shown.
//! - [`run_local`] / [`settle`]: drive the single-threaded runtime the
//!   engine expects.
//!
//! # Example
//!
//! ```ignore
//! run_local(async {
//!     let repo = ScriptedRepository::new();
//!     let engine = InteractionEngine::new(repo.clone());
//!     let ticket = engine.toggle(&post, InteractionKind::Like);
//!     settle().await;
//!     repo.respond(InteractionKind::Like, &post, ticket.sequence, Reply::ok(true, 4));
//!     assert!(matches!(ticket.settled().await, Some(ReconcileOutcome::Committed { .. })));
//! });
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;
use tally_core::{Displayed, EntityId, EntityInteractionState, InteractionKind};
use tally_runtime::{
    FavoriteResponse, FollowResponse, LikeResponse, Repository, RepositoryError, RepostResponse,
};
use tokio::sync::oneshot;
use tokio::task::LocalSet;

/// Server answer for one scripted request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Success carrying the server's view of the interaction.
    Ok { active: bool, count: i64 },
    Err(RepositoryError),
}

impl Reply {
    #[must_use]
    pub fn ok(active: bool, count: i64) -> Self {
        Self::Ok { active, count }
    }

    /// A dropped connection.
    #[must_use]
    pub fn network() -> Self {
        Self::Err(RepositoryError::Network("connection reset by peer".into()))
    }

    #[must_use]
    pub fn timeout() -> Self {
        Self::Err(RepositoryError::Timeout)
    }

    #[must_use]
    pub fn rejected(status: u16, message: &str) -> Self {
        Self::Err(RepositoryError::Rejected {
            status,
            message: message.to_owned(),
        })
    }

    fn into_result(self) -> Result<(bool, i64), RepositoryError> {
        match self {
            Self::Ok { active, count } => Ok((active, count)),
            Self::Err(err) => Err(err),
        }
    }
}

/// One request the engine issued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub kind: InteractionKind,
    pub entity: EntityId,
    pub sequence: u64,
}

type CallKey = (InteractionKind, EntityId, u64);

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    waiting: HashMap<CallKey, oneshot::Sender<Reply>>,
    queued: HashMap<CallKey, Reply>,
}

/// Repository that answers only when told to.
///
/// Cloning yields another handle to the same script, so a test keeps one
/// clone and hands the other to the engine.
#[derive(Clone, Default)]
pub struct ScriptedRepository {
    script: Rc<RefCell<Script>>,
}

impl ScriptedRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the request for `(kind, entity, sequence)`.
    ///
    /// If the request has not been issued yet the reply is queued and
    /// returned as soon as it is. Returns `true` if a waiting request was
    /// answered.
    pub fn respond(
        &self,
        kind: InteractionKind,
        entity: &EntityId,
        sequence: u64,
        reply: Reply,
    ) -> bool {
        let key = (kind, entity.clone(), sequence);
        let mut script = self.script.borrow_mut();
        match script.waiting.remove(&key) {
            Some(tx) => tx.send(reply).is_ok(),
            None => {
                script.queued.insert(key, reply);
                false
            }
        }
    }

    /// Every request issued so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.script.borrow().calls.clone()
    }

    /// Number of issued requests still waiting for a reply.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.script.borrow().waiting.len()
    }

    async fn call(
        &self,
        kind: InteractionKind,
        entity: &EntityId,
        sequence: u64,
    ) -> Result<(bool, i64), RepositoryError> {
        let key = (kind, entity.clone(), sequence);
        let rx = {
            let mut script = self.script.borrow_mut();
            script.calls.push(Call {
                kind,
                entity: entity.clone(),
                sequence,
            });
            if let Some(reply) = script.queued.remove(&key) {
                return reply.into_result();
            }
            let (tx, rx) = oneshot::channel();
            script.waiting.insert(key, tx);
            rx
        };
        tracing::trace!(%entity, %kind, sequence, "scripted request waiting");
        match rx.await {
            Ok(reply) => reply.into_result(),
            Err(_) => Err(RepositoryError::Network("script dropped".into())),
        }
    }
}

#[async_trait(?Send)]
impl Repository for ScriptedRepository {
    async fn toggle_like(
        &self,
        entity: &EntityId,
        sequence: u64,
    ) -> Result<LikeResponse, RepositoryError> {
        let (active, count) = self.call(InteractionKind::Like, entity, sequence).await?;
        Ok(LikeResponse {
            is_liked: active,
            likes_count: count,
        })
    }

    async fn toggle_favorite(
        &self,
        entity: &EntityId,
        sequence: u64,
    ) -> Result<FavoriteResponse, RepositoryError> {
        let (active, count) = self
            .call(InteractionKind::Favorite, entity, sequence)
            .await?;
        Ok(FavoriteResponse {
            is_favorited: active,
            favorites_count: count,
        })
    }

    async fn repost(
        &self,
        entity: &EntityId,
        sequence: u64,
    ) -> Result<RepostResponse, RepositoryError> {
        let (_, count) = self.call(InteractionKind::Repost, entity, sequence).await?;
        Ok(RepostResponse {
            reposts_count: count,
        })
    }

    async fn toggle_follow(
        &self,
        entity: &EntityId,
        sequence: u64,
    ) -> Result<FollowResponse, RepositoryError> {
        let (active, _) = self.call(InteractionKind::Follow, entity, sequence).await?;
        Ok(FollowResponse {
            is_following: active,
        })
    }
}

impl std::fmt::Debug for ScriptedRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let script = self.script.borrow();
        f.debug_struct("ScriptedRepository")
            .field("calls", &script.calls.len())
            .field("waiting", &script.waiting.len())
            .field("queued", &script.queued.len())
            .finish()
    }
}

/// Subscriber that records every state it receives.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Rc<RefCell<Vec<EntityInteractionState>>>,
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener feeding this recorder.
    pub fn listener(&self) -> impl Fn(&EntityInteractionState) + 'static {
        let seen = Rc::clone(&self.seen);
        move |state| seen.borrow_mut().push(state.clone())
    }

    /// Number of notifications received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.borrow().is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<EntityInteractionState> {
        self.seen.borrow().last().cloned()
    }

    /// Every displayed value of `kind`, in notification order.
    #[must_use]
    pub fn displayed(&self, kind: InteractionKind) -> Vec<Displayed> {
        self.seen
            .borrow()
            .iter()
            .map(|state| state.displayed(kind))
            .collect()
    }

    /// Every full state received, in notification order.
    #[must_use]
    pub fn states(&self) -> Vec<EntityInteractionState> {
        self.seen.borrow().clone()
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("notifications", &self.len())
            .finish()
    }
}

/// Run `future` to completion on a fresh current-thread runtime inside a
/// [`LocalSet`], the environment [`InteractionEngine::toggle`] needs.
///
/// [`InteractionEngine::toggle`]: tally_runtime::InteractionEngine::toggle
///
/// # Panics
///
/// Panics if the runtime cannot be built.
pub fn run_local<F: Future>(future: F) -> F::Output {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("build current-thread runtime");
    LocalSet::new().block_on(&runtime, future)
}

/// Yield enough times for every spawned reconciliation task to reach its
/// repository call (or finish, if its reply was queued).
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_reply_answers_later_call() {
        run_local(async {
            let repo = ScriptedRepository::new();
            let post = EntityId::post("1");
            assert!(!repo.respond(InteractionKind::Like, &post, 1, Reply::ok(true, 9)));

            let response = repo.toggle_like(&post, 1).await.unwrap();
            assert_eq!(
                response,
                LikeResponse {
                    is_liked: true,
                    likes_count: 9
                }
            );
            assert_eq!(repo.waiting(), 0);
        });
    }

    #[test]
    fn waiting_call_receives_reply() {
        run_local(async {
            let repo = ScriptedRepository::new();
            let post = EntityId::post("1");
            let handle = {
                let repo = repo.clone();
                let post = post.clone();
                tokio::task::spawn_local(async move { repo.repost(&post, 3).await })
            };
            settle().await;
            assert_eq!(repo.waiting(), 1);
            assert!(repo.respond(InteractionKind::Repost, &post, 3, Reply::ok(false, 2)));

            let response = handle.await.unwrap().unwrap();
            assert_eq!(response.reposts_count, 2);
            assert_eq!(
                repo.calls(),
                vec![Call {
                    kind: InteractionKind::Repost,
                    entity: post,
                    sequence: 3
                }]
            );
        });
    }

    #[test]
    fn error_reply_propagates() {
        run_local(async {
            let repo = ScriptedRepository::new();
            let user = EntityId::user("u1");
            repo.respond(InteractionKind::Follow, &user, 1, Reply::rejected(403, "blocked"));
            let err = repo.toggle_follow(&user, 1).await.unwrap_err();
            assert_eq!(
                err,
                RepositoryError::Rejected {
                    status: 403,
                    message: "blocked".into()
                }
            );
        });
    }

    #[test]
    fn recorder_collects_states() {
        let recorder = Recorder::new();
        let listener = recorder.listener();
        listener(&EntityInteractionState::new());
        listener(&EntityInteractionState::new());
        assert_eq!(recorder.len(), 2);
        assert_eq!(
            recorder.displayed(InteractionKind::Like),
            vec![Displayed::new(false, 0); 2]
        );
    }
}
