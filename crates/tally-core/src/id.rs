//! Identifiers for interaction-bearing entities and the interaction kinds they carry.
//!
//! An [`EntityId`] is the `(entity_kind, key)` pair. Posts and users live in
//! separate key spaces, so `post:42` and `user:42` never share state.

use core::fmt;

/// The class of entity an id refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EntityKind {
    /// A feed post (likes, favorites, reposts).
    Post,
    /// A user profile (follows).
    User,
}

impl EntityKind {
    /// Lowercase name used in the canonical form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::User => "user",
        }
    }
}

/// Unique identifier of an entity whose interaction state is tracked.
///
/// # Construction
///
/// ```
/// # use tally_core::id::{EntityId, EntityKind};
/// let post = EntityId::post("1");
/// assert_eq!(post.kind(), EntityKind::Post);
/// assert_eq!(post.to_string(), "post:1");
///
/// let user = EntityId::user("alice");
/// assert_eq!(user.key(), "alice");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityId {
    kind: EntityKind,
    key: String,
}

impl EntityId {
    /// Create an id from an entity kind and a backend key.
    #[must_use]
    pub fn new(kind: EntityKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    /// Id of a post.
    #[must_use]
    pub fn post(key: impl Into<String>) -> Self {
        Self::new(EntityKind::Post, key)
    }

    /// Id of a user.
    #[must_use]
    pub fn user(key: impl Into<String>) -> Self {
        Self::new(EntityKind::User, key)
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The backend key, as handed to the repository.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.key)
    }
}

/// One of the interactions a viewer can perform on an entity.
///
/// Each kind owns independent state per entity. [`Repost`](Self::Repost) is
/// count-only: reposting increments and there is no way to take it back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum InteractionKind {
    Like,
    Favorite,
    Repost,
    Follow,
}

impl InteractionKind {
    /// Every kind, in slot order.
    pub const ALL: [Self; 4] = [Self::Like, Self::Favorite, Self::Repost, Self::Follow];

    /// Number of kinds.
    pub const COUNT: usize = Self::ALL.len();

    /// Slot index of this kind inside per-entity state.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Like => 0,
            Self::Favorite => 1,
            Self::Repost => 2,
            Self::Follow => 3,
        }
    }

    /// Whether the kind has an on/off flag alongside its counter.
    #[inline]
    #[must_use]
    pub const fn is_toggleable(self) -> bool {
        !matches!(self, Self::Repost)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Favorite => "favorite",
            Self::Repost => "repost",
            Self::Follow => "follow",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
