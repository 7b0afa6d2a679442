//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::types::{ContentKind, ReactionKind, Role};

/// The requester of an operation. Anonymous requests carry no actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// Authorization view over an article or a comment.
///
/// For comments, `is_published` mirrors the parent article and the
/// `article_*` fields describe that article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentResource {
    pub id: Uuid,
    pub kind: ContentKind,
    pub owner_id: Option<Uuid>,
    pub owner_role: Option<Role>,
    pub is_published: bool,
    pub parent_id: Option<Uuid>,
    pub article_id: Option<Uuid>,
    pub article_owner_id: Option<Uuid>,
    pub article_owner_role: Option<Role>,
}

impl ContentResource {
    pub fn article(id: Uuid, owner: Option<(Uuid, Role)>, is_published: bool) -> Self {
        Self {
            id,
            kind: ContentKind::Article,
            owner_id: owner.map(|(id, _)| id),
            owner_role: owner.map(|(_, role)| role),
            is_published,
            parent_id: None,
            article_id: None,
            article_owner_id: None,
            article_owner_role: None,
        }
    }

    /// Builds a comment view inheriting visibility from `article`.
    pub fn comment(
        id: Uuid,
        owner: Option<(Uuid, Role)>,
        article: &ContentResource,
        parent_id: Option<Uuid>,
    ) -> Self {
        Self {
            id,
            kind: ContentKind::Comment,
            owner_id: owner.map(|(id, _)| id),
            owner_role: owner.map(|(_, role)| role),
            is_published: article.is_published,
            parent_id,
            article_id: Some(article.id),
            article_owner_id: article.owner_id,
            article_owner_role: article.owner_role,
        }
    }

    pub fn is_owned_by(&self, actor_id: Uuid) -> bool {
        self.owner_id == Some(actor_id)
    }

    pub fn is_comment(&self) -> bool {
        self.kind == ContentKind::Comment
    }

    /// The article whose read paths are affected by a change to this resource.
    pub fn family_article_id(&self) -> Uuid {
        match self.kind {
            ContentKind::Article => self.id,
            ContentKind::Comment => self.article_id.unwrap_or(self.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub id: Uuid,
    pub target_id: Uuid,
    pub actor_id: Uuid,
    pub kind: ReactionKind,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Aggregate like/dislike counters for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub likes: u64,
    pub dislikes: u64,
}

/// Every counter stored on a content row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCounters {
    pub likes: u64,
    pub dislikes: u64,
    pub views: u64,
    pub comments: u64,
}

impl ContentCounters {
    pub fn reactions(&self) -> ReactionCounts {
        ReactionCounts {
            likes: self.likes,
            dislikes: self.dislikes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub article_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub author_role: Role,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Partial update applied to an article or comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub body: Option<String>,
}

impl ContentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::invalid("patch", "carries no changes"));
        }
        if self.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
            return Err(DomainError::invalid("title", "must not be blank"));
        }
        Ok(())
    }
}
