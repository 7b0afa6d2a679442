//! Like/dislike state machine.

use serde::{Deserialize, Serialize};

use crate::domain::entities::ReactionCounts;
use crate::domain::types::ReactionKind;

/// Reaction held by one actor on one target. `None` means no row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionState {
    None,
    Liked,
    Disliked,
}

impl ReactionState {
    pub fn from_record(kind: Option<ReactionKind>) -> Self {
        match kind {
            None => Self::None,
            Some(ReactionKind::Like) => Self::Liked,
            Some(ReactionKind::Dislike) => Self::Disliked,
        }
    }

    /// Row type to persist for this state.
    pub fn kind(self) -> Option<ReactionKind> {
        match self {
            Self::None => None,
            Self::Liked => Some(ReactionKind::Like),
            Self::Disliked => Some(ReactionKind::Dislike),
        }
    }

    /// Repeating a reaction clears it; the opposite one swaps in a single step.
    pub fn toggle(self, input: ReactionKind) -> Transition {
        let (next, like_delta, dislike_delta) = match (self, input) {
            (Self::None, ReactionKind::Like) => (Self::Liked, 1, 0),
            (Self::None, ReactionKind::Dislike) => (Self::Disliked, 0, 1),
            (Self::Liked, ReactionKind::Like) => (Self::None, -1, 0),
            (Self::Liked, ReactionKind::Dislike) => (Self::Disliked, -1, 1),
            (Self::Disliked, ReactionKind::Like) => (Self::Liked, 1, -1),
            (Self::Disliked, ReactionKind::Dislike) => (Self::None, 0, -1),
        };
        Transition {
            from: self,
            next,
            like_delta,
            dislike_delta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ReactionState,
    pub next: ReactionState,
    pub like_delta: i64,
    pub dislike_delta: i64,
}

impl Transition {
    /// What the single persisted row must become.
    pub fn row_change(&self) -> RowChange {
        match (self.from.kind(), self.next.kind()) {
            (None, Some(kind)) => RowChange::Insert(kind),
            (Some(_), Some(kind)) => RowChange::Retype(kind),
            (Some(_), None) => RowChange::Remove,
            (None, None) => RowChange::Keep,
        }
    }

    /// Applies the deltas with a zero floor. Returns the counts and whether
    /// the floor had to absorb a decrement.
    pub fn apply(&self, counts: ReactionCounts) -> (ReactionCounts, bool) {
        let (likes, like_clamped) = apply_delta(counts.likes, self.like_delta);
        let (dislikes, dislike_clamped) = apply_delta(counts.dislikes, self.dislike_delta);
        (
            ReactionCounts { likes, dislikes },
            like_clamped || dislike_clamped,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    Insert(ReactionKind),
    Retype(ReactionKind),
    Remove,
    Keep,
}

/// Adds `delta` to `value`, flooring at zero.
pub fn apply_delta(value: u64, delta: i64) -> (u64, bool) {
    if delta >= 0 {
        (value.saturating_add(delta.unsigned_abs()), false)
    } else {
        let magnitude = delta.unsigned_abs();
        (value.saturating_sub(magnitude), magnitude > value)
    }
}
