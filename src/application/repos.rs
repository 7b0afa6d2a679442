//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{
    CommentRecord, ContentCounters, ContentPatch, ContentResource, ReactionRecord,
};
use crate::domain::types::{CounterField, ReactionKind};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("integrity error: {message}")]
    Integrity { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCommentParams {
    pub article_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub body: String,
}

/// Content persistence consumed by the engine.
///
/// Each call is transactional on its own row; no call spans another.
#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn load_resource(&self, id: Uuid) -> Result<Option<ContentResource>, RepoError>;

    async fn actor_exists(&self, id: Uuid) -> Result<bool, RepoError>;

    async fn find_reaction(
        &self,
        target_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Option<ReactionRecord>, RepoError>;

    /// Inserts or replaces the single row for `(target_id, actor_id)`.
    async fn save_reaction(&self, record: ReactionRecord) -> Result<(), RepoError>;

    async fn delete_reaction(&self, id: Uuid) -> Result<(), RepoError>;

    async fn count_reactions(&self, target_id: Uuid, kind: ReactionKind)
    -> Result<u64, RepoError>;

    /// Adds `delta` to a counter, flooring at zero, and returns the stored value.
    async fn increment_counter(
        &self,
        id: Uuid,
        field: CounterField,
        delta: i64,
    ) -> Result<u64, RepoError>;

    async fn reset_counter(&self, id: Uuid, field: CounterField, value: u64)
    -> Result<(), RepoError>;

    async fn counters(&self, id: Uuid) -> Result<ContentCounters, RepoError>;

    /// Removes every comment of an article with their reactions; returns rows removed.
    async fn cascade_delete_comments_for_article(&self, article_id: Uuid)
    -> Result<u64, RepoError>;

    async fn update_content(&self, id: Uuid, patch: &ContentPatch) -> Result<(), RepoError>;

    /// Deletes the row together with replies and reactions; returns content rows removed.
    async fn delete_content(&self, id: Uuid) -> Result<u64, RepoError>;

    async fn insert_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError>;

    async fn set_published(&self, article_id: Uuid, published: bool) -> Result<(), RepoError>;
}
