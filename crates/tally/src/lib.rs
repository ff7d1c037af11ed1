#![forbid(unsafe_code)]

//! Tally public facade.
//!
//! One [`InteractionEngine`] per session owns the like/favorite/repost/follow
//! state of every post and user on screen. Screens subscribe to entities,
//! toggles apply instantly and are reconciled against the backend in the
//! background; every screen showing the same entity always shows the same
//! numbers.
//!
//! # Quick start
//!
//! ```ignore
//! use tally::prelude::*;
//!
//! let engine = InteractionEngine::new(api_client);
//! let post = EntityId::post("1");
//! engine.seed(&post, InteractionKind::Like, false, 3);
//!
//! let mut scope = SubscriptionScope::new();
//! scope.subscribe(&engine, &post, |state| render(state));
//!
//! let ticket = engine.toggle(&post, InteractionKind::Like);
//! if let Some(ReconcileOutcome::Reverted(err)) = ticket.settled().await {
//!     toast(&err.to_string());
//! }
//! ```

pub use tally_core as core;
pub use tally_runtime as runtime;

pub use tally_core::{
    Authoritative, Displayed, EntityId, EntityInteractionState, EntityKind, InteractionKind,
};
pub use tally_runtime::{
    ConfigError, EngineConfig, EngineStats, InteractionEngine, InteractionSnapshot, KindSnapshot,
    ReconcileOutcome, Repository, RepositoryError, Subscription, SubscriptionScope, ToggleTicket,
};

#[cfg(feature = "logging")]
pub mod logging;

/// Everything a screen needs to bind to interaction state.
pub mod prelude {
    pub use crate::{
        Displayed, EngineConfig, EntityId, EntityInteractionState, InteractionEngine,
        InteractionKind, ReconcileOutcome, Repository, RepositoryError, Subscription,
        SubscriptionScope, ToggleTicket,
    };
}
