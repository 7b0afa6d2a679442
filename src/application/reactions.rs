//! Like/dislike ledger.
//!
//! A toggle runs under the lock of the target's article, the same lock that
//! publication changes and comment writes take. Under it the ledger re-reads
//! the target, re-checks the react rule, persists the actor's row and moves
//! the counters by the transition's deltas. Counters are never recounted on
//! this path; `reconcile` exists for repair.

use std::sync::Arc;

use metrics::counter;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::access::enforce;
use crate::application::error::AppError;
use crate::application::locks::KeyedLocks;
use crate::application::repos::ContentRepo;
use crate::domain::entities::{Actor, ContentResource, ReactionCounts, ReactionRecord};
use crate::domain::policy::{PolicyAction, PolicyEvaluator};
use crate::domain::reactions::{ReactionState, RowChange};
use crate::domain::types::{CounterField, ReactionKind};
use crate::util::clock::Clock;

pub struct ReactionLedger {
    repo: Arc<dyn ContentRepo>,
    policy: PolicyEvaluator,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks>,
}

impl ReactionLedger {
    /// `locks` is keyed by article id and shared with every other writer of
    /// the article family.
    pub fn new(
        repo: Arc<dyn ContentRepo>,
        policy: PolicyEvaluator,
        clock: Arc<dyn Clock>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            repo,
            policy,
            clock,
            locks,
        }
    }

    /// Applies one like or dislike press and returns the target's counts.
    pub async fn toggle(
        &self,
        target_id: Uuid,
        actor: &Actor,
        kind: ReactionKind,
    ) -> Result<ReactionCounts, AppError> {
        let target = self.load_target(target_id).await?;
        if !self.repo.actor_exists(actor.id).await? {
            return Err(AppError::not_found("user", actor.id));
        }
        enforce(&self.policy, Some(actor), &target, PolicyAction::React)?;

        let _guard = self.locks.acquire(target.family_article_id()).await;
        // Unpublish or delete may have landed while waiting.
        let target = self.load_target(target_id).await?;
        enforce(&self.policy, Some(actor), &target, PolicyAction::React)?;

        let existing = self.repo.find_reaction(target_id, actor.id).await?;
        let state = ReactionState::from_record(existing.as_ref().map(|record| record.kind));
        let transition = state.toggle(kind);

        let now = self.clock.now();
        match (transition.row_change(), existing) {
            (RowChange::Insert(kind), _) => {
                self.repo
                    .save_reaction(ReactionRecord {
                        id: Uuid::new_v4(),
                        target_id,
                        actor_id: actor.id,
                        kind,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
            }
            (RowChange::Retype(kind), Some(mut record)) => {
                record.kind = kind;
                record.updated_at = now;
                self.repo.save_reaction(record).await?;
            }
            (RowChange::Remove, Some(record)) => {
                self.repo.delete_reaction(record.id).await?;
            }
            (RowChange::Retype(_) | RowChange::Remove, None) | (RowChange::Keep, _) => {}
        }

        let before = self.repo.counters(target_id).await?.reactions();
        let (_, clamped) = transition.apply(before);
        if clamped {
            warn!(
                target_id = %target_id,
                likes = before.likes,
                dislikes = before.dislikes,
                like_delta = transition.like_delta,
                dislike_delta = transition.dislike_delta,
                "Reaction counter hit zero floor; counters have drifted"
            );
        }

        let mut counts = before;
        if transition.like_delta != 0 {
            counts.likes = self
                .repo
                .increment_counter(target_id, CounterField::Likes, transition.like_delta)
                .await?;
        }
        if transition.dislike_delta != 0 {
            counts.dislikes = self
                .repo
                .increment_counter(target_id, CounterField::Dislikes, transition.dislike_delta)
                .await?;
        }

        counter!(
            "inkpost_reaction_toggle_total",
            "kind" => kind.as_str(),
            "result" => state_label(transition.next)
        )
        .increment(1);
        info!(
            target_id = %target_id,
            actor_id = %actor.id,
            kind = kind.as_str(),
            from = state_label(transition.from),
            to = state_label(transition.next),
            likes = counts.likes,
            dislikes = counts.dislikes,
            "Reaction toggled"
        );

        Ok(counts)
    }

    pub async fn state(&self, target_id: Uuid, actor_id: Uuid) -> Result<ReactionState, AppError> {
        let record = self.repo.find_reaction(target_id, actor_id).await?;
        Ok(ReactionState::from_record(record.map(|record| record.kind)))
    }

    /// Recounts reaction rows and overwrites the stored counters.
    pub async fn reconcile(&self, target_id: Uuid) -> Result<ReactionCounts, AppError> {
        let target = self.load_target(target_id).await?;
        let _guard = self.locks.acquire(target.family_article_id()).await;

        let stored = self.repo.counters(target_id).await?.reactions();
        let counts = ReactionCounts {
            likes: self
                .repo
                .count_reactions(target_id, ReactionKind::Like)
                .await?,
            dislikes: self
                .repo
                .count_reactions(target_id, ReactionKind::Dislike)
                .await?,
        };
        self.repo
            .reset_counter(target_id, CounterField::Likes, counts.likes)
            .await?;
        self.repo
            .reset_counter(target_id, CounterField::Dislikes, counts.dislikes)
            .await?;

        if stored != counts {
            warn!(
                target_id = %target_id,
                stored_likes = stored.likes,
                stored_dislikes = stored.dislikes,
                likes = counts.likes,
                dislikes = counts.dislikes,
                "Reaction counters reconciled"
            );
        }
        Ok(counts)
    }

    async fn load_target(&self, target_id: Uuid) -> Result<ContentResource, AppError> {
        self.repo
            .load_resource(target_id)
            .await?
            .ok_or_else(|| AppError::not_found("content", target_id))
    }
}

fn state_label(state: ReactionState) -> &'static str {
    match state {
        ReactionState::None => "none",
        ReactionState::Liked => "liked",
        ReactionState::Disliked => "disliked",
    }
}
