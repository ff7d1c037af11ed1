#![forbid(unsafe_code)]

//! Core state types for Tally.
//!
//! This crate provides:
//! - [`EntityId`] and [`InteractionKind`] to address one interaction slot
//! - [`EntityInteractionState`] holding count/active/pending/sequence per kind
//! - [`guard`], the pure counter arithmetic every mutation goes through
//! - [`EntityStore`], the canonical keyed record of interaction state

pub mod guard;
pub mod id;
pub mod state;
pub mod store;

pub use guard::Displayed;
pub use id::{EntityId, EntityKind, InteractionKind};
pub use state::{Authoritative, EntityInteractionState, KindState, PendingMutation};
pub use store::{EntityStore, Optimistic, Resolution};
