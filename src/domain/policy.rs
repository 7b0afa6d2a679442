//! Content authorization policy.
//!
//! Decisions come from a single rule table keyed by requester and action
//! class. Each rule lists grants evaluated in order; the first grant that
//! either allows or blocks wins, otherwise the rule's fallback reason is
//! returned. The evaluator is pure and holds no state beyond the table.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{Actor, ContentResource};
use crate::domain::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    View,
    ViewDraft,
    Update,
    Delete,
    React,
    ModerateComment,
}

impl PolicyAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::ViewDraft => "view_draft",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::React => "react",
            Self::ModerateComment => "moderate_comment",
        }
    }

    pub fn all() -> &'static [PolicyAction] {
        &[
            Self::View,
            Self::ViewDraft,
            Self::Update,
            Self::Delete,
            Self::React,
            Self::ModerateComment,
        ]
    }

    fn class(self) -> ActionClass {
        match self {
            Self::View => ActionClass::Read,
            Self::ViewDraft => ActionClass::ReadDraft,
            Self::React => ActionClass::React,
            Self::Update | Self::Delete | Self::ModerateComment => ActionClass::Mutate,
        }
    }
}

impl Display for PolicyAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PolicyAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "view_draft" | "view-draft" => Ok(Self::ViewDraft),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "react" => Ok(Self::React),
            "moderate_comment" | "moderate-comment" => Ok(Self::ModerateComment),
            _ => Err(()),
        }
    }
}

/// Typed reason attached to every denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    ForbiddenDraft,
    ForbiddenHierarchy,
    ForbiddenNotOwner,
    ForbiddenUnauthenticated,
}

impl DenyReason {
    /// Stable code surfaced to callers.
    pub fn code(self) -> &'static str {
        match self {
            Self::ForbiddenDraft => "FORBIDDEN_DRAFT",
            Self::ForbiddenHierarchy => "FORBIDDEN_HIERARCHY",
            Self::ForbiddenNotOwner => "FORBIDDEN_NOT_OWNER",
            Self::ForbiddenUnauthenticated => "FORBIDDEN_UNAUTHENTICATED",
        }
    }
}

impl Display for DenyReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(reason),
        }
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny(reason) => write!(f, "deny: {reason}"),
        }
    }
}

/// Which rows a list query may return for a requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    PublishedOnly,
    PublishedAndOwnDrafts { owner_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionClass {
    Read,
    ReadDraft,
    React,
    Mutate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    Anonymous,
    Role(Role),
}

#[derive(Debug, Clone, Copy)]
enum Grant {
    /// Resource is published.
    Published,
    /// Actor owns the resource.
    Owner,
    /// No restriction.
    AnyContent,
    /// Resource owner holds one of the listed roles.
    OwnerRoleIn(&'static [Role]),
    /// Blocks content owned by an equal or higher role.
    ShieldPeersAndSuperiors,
    /// Comment written under an article the actor owns, by an author ranked
    /// at most `max_author`.
    CommentUnderOwnArticle { max_author: Role },
}

enum GrantOutcome {
    Granted,
    Blocked(DenyReason),
    Skip,
}

impl Grant {
    fn apply(self, actor: Option<&Actor>, resource: &ContentResource) -> GrantOutcome {
        match self {
            Grant::Published => granted_if(resource.is_published),
            Grant::Owner => granted_if(actor.is_some_and(|a| resource.is_owned_by(a.id))),
            Grant::AnyContent => GrantOutcome::Granted,
            Grant::OwnerRoleIn(roles) => {
                granted_if(resource.owner_role.is_some_and(|role| roles.contains(&role)))
            }
            Grant::ShieldPeersAndSuperiors => {
                let (Some(actor), Some(owner_role)) = (actor, resource.owner_role) else {
                    return GrantOutcome::Skip;
                };
                if owner_role.rank() >= actor.role.rank() {
                    GrantOutcome::Blocked(DenyReason::ForbiddenHierarchy)
                } else {
                    GrantOutcome::Skip
                }
            }
            Grant::CommentUnderOwnArticle { max_author } => {
                let Some(actor) = actor else {
                    return GrantOutcome::Skip;
                };
                if !resource.is_comment() || resource.article_owner_id != Some(actor.id) {
                    return GrantOutcome::Skip;
                }
                match resource.owner_role {
                    Some(author) if author.outranks(max_author) => {
                        GrantOutcome::Blocked(DenyReason::ForbiddenHierarchy)
                    }
                    _ => GrantOutcome::Granted,
                }
            }
        }
    }
}

fn granted_if(condition: bool) -> GrantOutcome {
    if condition {
        GrantOutcome::Granted
    } else {
        GrantOutcome::Skip
    }
}

#[derive(Debug, Clone, Copy)]
struct PolicyRule {
    subject: Subject,
    class: ActionClass,
    grants: &'static [Grant],
    fallback: DenyReason,
}

const fn rule(
    subject: Subject,
    class: ActionClass,
    grants: &'static [Grant],
    fallback: DenyReason,
) -> PolicyRule {
    PolicyRule {
        subject,
        class,
        grants,
        fallback,
    }
}

const READ: &[Grant] = &[Grant::Published, Grant::Owner];
const READ_DRAFT: &[Grant] = &[Grant::Owner];
const REACT: &[Grant] = &[Grant::Published];

const fn visibility_rules(subject: Subject) -> [PolicyRule; 3] {
    [
        rule(subject, ActionClass::Read, READ, DenyReason::ForbiddenDraft),
        rule(
            subject,
            ActionClass::ReadDraft,
            READ_DRAFT,
            DenyReason::ForbiddenDraft,
        ),
        rule(subject, ActionClass::React, REACT, DenyReason::ForbiddenDraft),
    ]
}

const PRIMARY: Subject = Subject::Role(Role::PrimaryAdmin);
const SECONDARY: Subject = Subject::Role(Role::SecondaryAdmin);
const MEMBER: Subject = Subject::Role(Role::Member);
const SIMPLE: Subject = Subject::Role(Role::SimpleUser);

const PRIMARY_VISIBILITY: [PolicyRule; 3] = visibility_rules(PRIMARY);
const SECONDARY_VISIBILITY: [PolicyRule; 3] = visibility_rules(SECONDARY);
const MEMBER_VISIBILITY: [PolicyRule; 3] = visibility_rules(MEMBER);
const SIMPLE_VISIBILITY: [PolicyRule; 3] = visibility_rules(SIMPLE);

static STANDARD_RULES: &[PolicyRule] = &[
    rule(
        Subject::Anonymous,
        ActionClass::Read,
        &[Grant::Published],
        DenyReason::ForbiddenDraft,
    ),
    rule(
        Subject::Anonymous,
        ActionClass::ReadDraft,
        &[],
        DenyReason::ForbiddenDraft,
    ),
    rule(
        Subject::Anonymous,
        ActionClass::React,
        &[],
        DenyReason::ForbiddenUnauthenticated,
    ),
    rule(
        Subject::Anonymous,
        ActionClass::Mutate,
        &[],
        DenyReason::ForbiddenUnauthenticated,
    ),
    PRIMARY_VISIBILITY[0],
    PRIMARY_VISIBILITY[1],
    PRIMARY_VISIBILITY[2],
    rule(
        PRIMARY,
        ActionClass::Mutate,
        &[Grant::Owner, Grant::AnyContent],
        DenyReason::ForbiddenNotOwner,
    ),
    SECONDARY_VISIBILITY[0],
    SECONDARY_VISIBILITY[1],
    SECONDARY_VISIBILITY[2],
    rule(
        SECONDARY,
        ActionClass::Mutate,
        &[
            Grant::Owner,
            Grant::OwnerRoleIn(&[Role::Member]),
            Grant::ShieldPeersAndSuperiors,
        ],
        DenyReason::ForbiddenNotOwner,
    ),
    MEMBER_VISIBILITY[0],
    MEMBER_VISIBILITY[1],
    MEMBER_VISIBILITY[2],
    rule(
        MEMBER,
        ActionClass::Mutate,
        &[
            Grant::Owner,
            Grant::CommentUnderOwnArticle {
                max_author: Role::Member,
            },
        ],
        DenyReason::ForbiddenNotOwner,
    ),
    SIMPLE_VISIBILITY[0],
    SIMPLE_VISIBILITY[1],
    SIMPLE_VISIBILITY[2],
    rule(
        SIMPLE,
        ActionClass::Mutate,
        &[Grant::Owner],
        DenyReason::ForbiddenNotOwner,
    ),
];

/// Table-driven authorization for articles and comments.
#[derive(Debug, Clone, Copy)]
pub struct PolicyEvaluator {
    rules: &'static [PolicyRule],
}

impl Default for PolicyEvaluator {
    fn default() -> Self {
        Self::standard()
    }
}

impl PolicyEvaluator {
    pub fn standard() -> Self {
        Self {
            rules: STANDARD_RULES,
        }
    }

    /// Decide whether `actor` may perform `action` on `resource`.
    pub fn authorize(
        &self,
        actor: Option<&Actor>,
        resource: &ContentResource,
        action: PolicyAction,
    ) -> Decision {
        let subject = actor.map_or(Subject::Anonymous, |a| Subject::Role(a.role));
        let class = action.class();

        // React needs an identity before publication is even considered.
        if class == ActionClass::React && actor.is_none() {
            return Decision::Deny(DenyReason::ForbiddenUnauthenticated);
        }

        let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.subject == subject && rule.class == class)
        else {
            return Decision::Deny(match actor {
                None => DenyReason::ForbiddenUnauthenticated,
                Some(_) => DenyReason::ForbiddenNotOwner,
            });
        };

        for grant in rule.grants {
            match grant.apply(actor, resource) {
                GrantOutcome::Granted => return Decision::Allow,
                GrantOutcome::Blocked(reason) => return Decision::Deny(reason),
                GrantOutcome::Skip => {}
            }
        }

        Decision::Deny(rule.fallback)
    }

    /// Row filter for list reads.
    pub fn list_scope(&self, actor: Option<&Actor>) -> ListScope {
        match actor {
            Some(actor) => ListScope::PublishedAndOwnDrafts { owner_id: actor.id },
            None => ListScope::PublishedOnly,
        }
    }

    /// Keep only the resources `actor` may view.
    pub fn filter_visible<I>(&self, actor: Option<&Actor>, resources: I) -> Vec<ContentResource>
    where
        I: IntoIterator<Item = ContentResource>,
    {
        resources
            .into_iter()
            .filter(|resource| {
                self.authorize(actor, resource, PolicyAction::View)
                    .is_allowed()
            })
            .collect()
    }
}
