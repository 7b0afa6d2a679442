//! Shared domain enumerations aligned with persisted enums.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role, ordered from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    PrimaryAdmin,
    SecondaryAdmin,
    Member,
    SimpleUser,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryAdmin => "primary_admin",
            Self::SecondaryAdmin => "secondary_admin",
            Self::Member => "member",
            Self::SimpleUser => "simple_user",
        }
    }

    /// Position in the hierarchy; higher outranks lower.
    pub fn rank(self) -> u8 {
        match self {
            Self::PrimaryAdmin => 3,
            Self::SecondaryAdmin => 2,
            Self::Member => 1,
            Self::SimpleUser => 0,
        }
    }

    pub fn outranks(self, other: Role) -> bool {
        self.rank() > other.rank()
    }

    pub fn all() -> &'static [Role] {
        &[
            Self::PrimaryAdmin,
            Self::SecondaryAdmin,
            Self::Member,
            Self::SimpleUser,
        ]
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary_admin" | "primary-admin" => Ok(Self::PrimaryAdmin),
            "secondary_admin" | "secondary-admin" => Ok(Self::SecondaryAdmin),
            "member" => Ok(Self::Member),
            "simple_user" | "simple-user" => Ok(Self::SimpleUser),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Article,
    Comment,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Comment => "comment",
        }
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }
}

impl Display for ReactionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            _ => Err(()),
        }
    }
}

/// Aggregate counters stored on a content row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterField {
    Likes,
    Dislikes,
    Views,
    Comments,
}

impl CounterField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Likes => "likes_count",
            Self::Dislikes => "dislikes_count",
            Self::Views => "views_count",
            Self::Comments => "comments_count",
        }
    }
}

impl Display for CounterField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
