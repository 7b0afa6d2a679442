//! Cache keys and invalidation tags.
//!
//! A tag names a read path. Every cached value is stored under a plain string
//! key and registered with the tags of the read paths it feeds, so a content
//! mutation can drop all of them at once.

use std::fmt::{Display, Formatter};

use uuid::Uuid;

use crate::domain::entities::ContentResource;
use crate::domain::types::ContentKind;

const TAG_PREFIX: &str = "tag:";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheTag {
    /// Public article listings.
    ArticlesPublic,
    Homepage,
    Search,
    /// Counters and dashboards.
    Stats,
    /// Detail view of a single article.
    Article(Uuid),
    /// Comment thread of a single article.
    ArticleComments(Uuid),
}

impl CacheTag {
    /// Key of the bookkeeping set that records members of this tag.
    pub fn bookkeeping_key(&self) -> String {
        format!("{TAG_PREFIX}{self}")
    }

    /// Tags covering every read path that shows `resource` or its counters.
    pub fn family_of(resource: &ContentResource) -> Vec<CacheTag> {
        let article_id = resource.family_article_id();
        match resource.kind {
            ContentKind::Article => vec![
                CacheTag::ArticlesPublic,
                CacheTag::Homepage,
                CacheTag::Search,
                CacheTag::Stats,
                CacheTag::Article(article_id),
            ],
            ContentKind::Comment => vec![
                CacheTag::ArticlesPublic,
                CacheTag::Stats,
                CacheTag::Article(article_id),
                CacheTag::ArticleComments(article_id),
            ],
        }
    }
}

impl Display for CacheTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheTag::ArticlesPublic => f.write_str("articles:public"),
            CacheTag::Homepage => f.write_str("homepage"),
            CacheTag::Search => f.write_str("search"),
            CacheTag::Stats => f.write_str("stats"),
            CacheTag::Article(id) => write!(f, "article:{id}"),
            CacheTag::ArticleComments(id) => write!(f, "article:{id}:comments"),
        }
    }
}

/// Key of the cached detail view of an article.
pub fn article_key(id: Uuid) -> String {
    format!("article:{id}")
}
