//! Entry point for every content read and mutation.
//!
//! The coordinator authorizes, performs the repository calls, and then drops
//! the cache tags of the affected content family. Cache trouble is never
//! surfaced to callers: it is logged, counted and bypassed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::access::enforce;
use crate::application::error::AppError;
use crate::application::locks::KeyedLocks;
use crate::application::reactions::ReactionLedger;
use crate::application::repos::{ContentRepo, NewCommentParams};
use crate::application::views::{ViewConfig, ViewDedupGuard, ViewerHints, ViewerIdentity};
use crate::cache::{CacheError, CacheIndex, CacheTag};
use crate::domain::entities::{Actor, CommentRecord, ContentPatch, ContentResource, ReactionCounts};
use crate::domain::error::DomainError;
use crate::domain::policy::{Decision, DenyReason, PolicyAction, PolicyEvaluator};
use crate::domain::types::{ContentKind, CounterField, ReactionKind};
use crate::util::clock::Clock;

pub struct ContentMutationCoordinator {
    repo: Arc<dyn ContentRepo>,
    policy: PolicyEvaluator,
    ledger: ReactionLedger,
    views: ViewDedupGuard,
    fingerprint_salt: String,
    cache: CacheIndex,
    clock: Arc<dyn Clock>,
    article_locks: Arc<KeyedLocks>,
}

impl ContentMutationCoordinator {
    pub fn new(
        repo: Arc<dyn ContentRepo>,
        cache: CacheIndex,
        views: &ViewConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let policy = PolicyEvaluator::standard();
        let article_locks = Arc::new(KeyedLocks::new());
        Self {
            ledger: ReactionLedger::new(
                repo.clone(),
                policy,
                clock.clone(),
                article_locks.clone(),
            ),
            repo,
            policy,
            views: ViewDedupGuard::new(views),
            fingerprint_salt: views.fingerprint_salt.clone(),
            cache,
            clock,
            article_locks,
        }
    }

    pub fn policy(&self) -> &PolicyEvaluator {
        &self.policy
    }

    pub fn ledger(&self) -> &ReactionLedger {
        &self.ledger
    }

    pub fn views(&self) -> &ViewDedupGuard {
        &self.views
    }

    pub fn cache(&self) -> &CacheIndex {
        &self.cache
    }

    /// Pure policy decision; no lookups, no side effects.
    pub fn check(
        &self,
        actor: Option<&Actor>,
        resource: &ContentResource,
        action: PolicyAction,
    ) -> Decision {
        self.policy.authorize(actor, resource, action)
    }

    /// Loads `resource_id` and returns it when `action` is allowed.
    pub async fn authorize(
        &self,
        actor: Option<&Actor>,
        resource_id: Uuid,
        action: PolicyAction,
    ) -> Result<ContentResource, AppError> {
        let resource = self.load(resource_id).await?;
        enforce(&self.policy, actor, &resource, action)?;
        Ok(resource)
    }

    pub async fn toggle_reaction(
        &self,
        target_id: Uuid,
        actor: &Actor,
        kind: ReactionKind,
    ) -> Result<ReactionCounts, AppError> {
        let counts = self.ledger.toggle(target_id, actor, kind).await?;
        match self.repo.load_resource(target_id).await {
            Ok(Some(resource)) => {
                self.invalidate(&CacheTag::family_of(&resource)).await;
            }
            Ok(None) => {}
            Err(error) => warn!(
                target_id = %target_id,
                error = %error,
                "Could not reload reaction target for cache invalidation"
            ),
        }
        Ok(counts)
    }

    /// Counts a view unless the same viewer saw `content_id` within the
    /// dedup window. Returns whether the view was counted.
    pub async fn register_view(
        &self,
        actor: Option<&Actor>,
        content_id: Uuid,
        hints: &ViewerHints,
    ) -> Result<bool, AppError> {
        let resource = self.authorize(actor, content_id, PolicyAction::View).await?;

        let mut hints = hints.clone();
        if let Some(actor) = actor {
            hints.user_id = Some(actor.id);
        }
        let identity = ViewerIdentity::resolve(&hints, &self.fingerprint_salt);
        if !self
            .views
            .should_count_view(content_id, &identity, self.clock.now())
        {
            return Ok(false);
        }

        counter!("inkpost_view_counted_total").increment(1);
        match self
            .repo
            .increment_counter(content_id, CounterField::Views, 1)
            .await
        {
            Ok(views) => debug!(content_id = %content_id, views, "View counted"),
            Err(error) => warn!(
                content_id = %content_id,
                error = %error,
                "View counter increment failed"
            ),
        }

        self.invalidate(&[
            CacheTag::Stats,
            CacheTag::Article(resource.family_article_id()),
        ])
        .await;
        Ok(true)
    }

    pub async fn update_content(
        &self,
        actor: &Actor,
        id: Uuid,
        patch: &ContentPatch,
    ) -> Result<(), AppError> {
        patch.validate()?;
        let resource = self
            .authorize(Some(actor), id, PolicyAction::Update)
            .await?;
        if resource.kind == ContentKind::Comment && patch.title.is_some() {
            return Err(AppError::validation("comments have no title"));
        }

        self.repo.update_content(id, patch).await?;
        info!(
            content_id = %id,
            kind = resource.kind.as_str(),
            actor_id = %actor.id,
            "Content updated"
        );

        self.invalidate(&CacheTag::family_of(&resource)).await;
        Ok(())
    }

    /// Deletes an article or a comment thread. Returns the number of content
    /// rows removed.
    pub async fn delete_content(&self, actor: &Actor, id: Uuid) -> Result<u64, AppError> {
        let resource = self
            .authorize(Some(actor), id, PolicyAction::Delete)
            .await?;
        let article_id = resource.family_article_id();

        let guard = self.article_locks.acquire(article_id).await;
        let removed = self.repo.delete_content(id).await?;
        if resource.kind == ContentKind::Comment && removed > 0 {
            self.repo
                .increment_counter(article_id, CounterField::Comments, -(removed as i64))
                .await?;
        }
        drop(guard);

        info!(
            content_id = %id,
            kind = resource.kind.as_str(),
            actor_id = %actor.id,
            removed,
            "Content deleted"
        );

        let mut tags = CacheTag::family_of(&resource);
        if resource.kind == ContentKind::Article {
            tags.push(CacheTag::ArticleComments(article_id));
        }
        self.invalidate(&tags).await;
        Ok(removed)
    }

    pub async fn create_comment(
        &self,
        actor: &Actor,
        article_id: Uuid,
        parent_id: Option<Uuid>,
        body: &str,
    ) -> Result<CommentRecord, AppError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(AppError::validation("comment body must not be empty"));
        }
        if !self.repo.actor_exists(actor.id).await? {
            return Err(AppError::not_found("user", actor.id));
        }

        let guard = self.article_locks.acquire(article_id).await;
        // Re-read under the lock so an in-flight unpublish cannot be raced.
        let article = self.load(article_id).await?;
        if article.kind != ContentKind::Article {
            return Err(AppError::validation("comments attach to articles only"));
        }
        if !article.is_published {
            return Err(AppError::Forbidden(DenyReason::ForbiddenDraft));
        }

        let record = self
            .repo
            .insert_comment(NewCommentParams {
                article_id,
                parent_id,
                author_id: actor.id,
                body: body.to_string(),
            })
            .await?;
        self.repo
            .increment_counter(article_id, CounterField::Comments, 1)
            .await?;
        drop(guard);

        info!(
            comment_id = %record.id,
            article_id = %article_id,
            actor_id = %actor.id,
            "Comment created"
        );

        let comment = ContentResource::comment(
            record.id,
            Some((actor.id, actor.role)),
            &article,
            parent_id,
        );
        self.invalidate(&CacheTag::family_of(&comment)).await;
        Ok(record)
    }

    /// Publishes or unpublishes an article. Unpublishing deletes every
    /// comment of the article and zeroes its comment counter.
    pub async fn set_published(
        &self,
        actor: &Actor,
        article_id: Uuid,
        published: bool,
    ) -> Result<(), AppError> {
        let article = self
            .authorize(Some(actor), article_id, PolicyAction::Update)
            .await?;
        if article.kind != ContentKind::Article {
            return Err(AppError::validation("only articles can be published"));
        }

        let guard = self.article_locks.acquire(article_id).await;
        self.repo.set_published(article_id, published).await?;
        let mut removed = 0;
        if !published {
            removed = self
                .repo
                .cascade_delete_comments_for_article(article_id)
                .await?;
            self.repo
                .reset_counter(article_id, CounterField::Comments, 0)
                .await?;
        }
        drop(guard);

        info!(
            article_id = %article_id,
            actor_id = %actor.id,
            published,
            comments_removed = removed,
            "Article publication changed"
        );

        let mut tags = CacheTag::family_of(&article);
        tags.push(CacheTag::ArticleComments(article_id));
        self.invalidate(&tags).await;
        Ok(())
    }

    /// Drops the viewer entries whose window has closed.
    pub fn sweep_views(&self) -> usize {
        self.views.sweep_expired(self.clock.now())
    }

    pub async fn cache_read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(value) => value,
            Err(error) => {
                cache_bypass(key, "read", &error);
                None
            }
        }
    }

    /// Stores `value` for `ttl`, or the configured default when `None`.
    pub async fn cache_write<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        tags: &[CacheTag],
    ) {
        let ttl = ttl.unwrap_or(self.cache.config().default_ttl);
        if let Err(error) = self.cache.set(key, value, ttl, tags).await {
            cache_bypass(key, "write", &error);
        }
    }

    /// Invalidates every tag; returns the number of values removed.
    pub async fn invalidate(&self, tags: &[CacheTag]) -> usize {
        let mut removed = 0;
        for tag in tags {
            match self.cache.invalidate_tag(tag).await {
                Ok(count) => removed += count,
                Err(error) => {
                    counter!("inkpost_cache_bypass_total").increment(1);
                    warn!(tag = %tag, error = %error, "Cache invalidation failed");
                }
            }
        }
        removed
    }

    pub async fn cached<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        tags: &[CacheTag],
        factory: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ttl = ttl.unwrap_or(self.cache.config().default_ttl);
        self.cache.get_or_set(key, ttl, tags, factory).await
    }

    async fn load(&self, id: Uuid) -> Result<ContentResource, AppError> {
        let resource = self
            .repo
            .load_resource(id)
            .await?
            .ok_or_else(|| DomainError::missing("content", id))?;
        Ok(resource)
    }
}

fn cache_bypass(key: &str, op: &'static str, error: &CacheError) {
    counter!("inkpost_cache_bypass_total").increment(1);
    warn!(key, op, error = %error, "Cache unavailable; bypassing");
}
