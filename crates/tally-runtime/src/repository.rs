//! Boundary to the networking code that talks to the backend.
//!
//! The engine only ever calls these four methods. Implementations live with
//! the transport; this crate ships none (the harness crate has a scripted
//! double).
//!
//! Each call may have its result discarded as stale, and calls for the same
//! entity may complete in any order. Timeouts are the implementation's
//! business; the engine waits as long as the future does.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tally_core::{Authoritative, EntityId, InteractionKind};
use thiserror::Error;

/// Response of a like toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResponse {
    pub is_liked: bool,
    pub likes_count: i64,
}

/// Response of a favorite toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteResponse {
    pub is_favorited: bool,
    pub favorites_count: i64,
}

/// Response of a repost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepostResponse {
    pub reposts_count: i64,
}

/// Response of a follow toggle. The backend does not report follower counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub is_following: bool,
}

impl From<LikeResponse> for Authoritative {
    fn from(r: LikeResponse) -> Self {
        Authoritative::new(Some(r.is_liked), Some(r.likes_count))
    }
}

impl From<FavoriteResponse> for Authoritative {
    fn from(r: FavoriteResponse) -> Self {
        Authoritative::new(Some(r.is_favorited), Some(r.favorites_count))
    }
}

impl From<RepostResponse> for Authoritative {
    fn from(r: RepostResponse) -> Self {
        Authoritative::new(None, Some(r.reposts_count))
    }
}

impl From<FollowResponse> for Authoritative {
    fn from(r: FollowResponse) -> Self {
        Authoritative::new(Some(r.is_following), None)
    }
}

/// Why a repository call failed. All variants are transient from the
/// engine's point of view: the toggle is reverted and never retried.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The request never produced a response (connection refused, reset, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// The transport gave up waiting.
    #[error("request timed out")]
    Timeout,

    /// The backend answered with an error.
    #[error("rejected by server ({status}): {message}")]
    Rejected {
        /// HTTP-style status code.
        status: u16,
        /// Server-provided message.
        message: String,
    },
}

/// Backend operations behind each interaction kind.
///
/// `sequence` is the number the engine is resolving with this call; it is
/// passed along for logging and request tagging, not for ordering.
#[async_trait(?Send)]
pub trait Repository {
    async fn toggle_like(
        &self,
        entity: &EntityId,
        sequence: u64,
    ) -> Result<LikeResponse, RepositoryError>;

    async fn toggle_favorite(
        &self,
        entity: &EntityId,
        sequence: u64,
    ) -> Result<FavoriteResponse, RepositoryError>;

    async fn repost(
        &self,
        entity: &EntityId,
        sequence: u64,
    ) -> Result<RepostResponse, RepositoryError>;

    async fn toggle_follow(
        &self,
        user: &EntityId,
        sequence: u64,
    ) -> Result<FollowResponse, RepositoryError>;
}

/// Call the repository method matching `kind` and normalize its answer.
pub(crate) async fn request(
    repository: &dyn Repository,
    kind: InteractionKind,
    entity: &EntityId,
    sequence: u64,
) -> Result<Authoritative, RepositoryError> {
    match kind {
        InteractionKind::Like => repository
            .toggle_like(entity, sequence)
            .await
            .map(Into::into),
        InteractionKind::Favorite => repository
            .toggle_favorite(entity, sequence)
            .await
            .map(Into::into),
        InteractionKind::Repost => repository.repost(entity, sequence).await.map(Into::into),
        InteractionKind::Follow => repository
            .toggle_follow(entity, sequence)
            .await
            .map(Into::into),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_response_wire_names() {
        let json = r#"{"isLiked":true,"likesCount":12}"#;
        let parsed: LikeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed,
            LikeResponse {
                is_liked: true,
                likes_count: 12
            }
        );
    }

    #[test]
    fn follow_response_reports_no_count() {
        let auth: Authoritative = FollowResponse { is_following: true }.into();
        assert_eq!(auth, Authoritative::new(Some(true), None));
    }

    #[test]
    fn repost_response_reports_no_flag() {
        let auth: Authoritative = RepostResponse { reposts_count: 3 }.into();
        assert_eq!(auth, Authoritative::new(None, Some(3)));
    }

    #[test]
    fn error_display() {
        let err = RepositoryError::Rejected {
            status: 429,
            message: "slow down".into(),
        };
        assert_eq!(err.to_string(), "rejected by server (429): slow down");
        assert_eq!(RepositoryError::Timeout.to_string(), "request timed out");
    }
}
