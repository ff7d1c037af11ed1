#![forbid(unsafe_code)]

//! Runtime for Tally: the pieces that sit between UI bindings, the
//! [`EntityStore`](tally_core::EntityStore) and the backend.
//!
//! - [`bus`]: per-entity fan-out of state snapshots to subscribers
//! - [`dispatcher`]: the toggle entry point (optimistic apply, publish, hand-off)
//! - [`reconciler`]: resolves one optimistic mutation against the [`Repository`]
//! - [`engine`]: [`InteractionEngine`], the object screens hold
//!
//! # Scheduling
//!
//! Everything runs on one thread. Store and bus calls are synchronous and
//! never hold a borrow across a listener call or an `.await`. Repository
//! requests are spawned with [`tokio::task::spawn_local`], so toggles must be
//! issued from inside a tokio [`LocalSet`](tokio::task::LocalSet).

pub mod bus;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod reconciler;
pub mod repository;
mod retention;
pub mod stats;

pub use bus::{Subscription, SubscriptionBus, SubscriptionScope};
pub use config::{ConfigError, EngineConfig};
pub use dispatcher::{Dispatcher, ToggleTicket};
pub use engine::{InteractionEngine, InteractionSnapshot, KindSnapshot};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use repository::{
    FavoriteResponse, FollowResponse, LikeResponse, Repository, RepositoryError, RepostResponse,
};
pub use stats::EngineStats;

use std::cell::RefCell;
use std::rc::Rc;

use tally_core::EntityStore;

/// The store as shared between dispatcher, reconciler and engine.
pub type SharedStore = Rc<RefCell<EntityStore>>;
