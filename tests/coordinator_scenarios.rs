mod support;

use inkpost::application::{AppError, ViewerHints};
use inkpost::application::repos::ContentRepo;
use inkpost::cache::{CacheTag, article_key};
use inkpost::domain::entities::{ContentPatch, ReactionCounts};
use inkpost::domain::policy::{DenyReason, PolicyAction};
use inkpost::domain::reactions::ReactionState;
use inkpost::domain::types::{ReactionKind, Role};
use support::Harness;
use uuid::Uuid;

fn forbidden(result: Result<impl std::fmt::Debug, AppError>) -> DenyReason {
    match result {
        Err(AppError::Forbidden(reason)) => reason,
        other => panic!("expected forbidden, got {other:?}"),
    }
}

#[tokio::test]
async fn unpublishing_cascades_comment_deletion() {
    let h = Harness::new();
    let author = h.user(Role::Member).await;
    let reader = h.user(Role::SimpleUser).await;
    let article = h.repo.add_article(Some(&author), true).await;
    for _ in 0..5 {
        h.coordinator
            .create_comment(&reader, article, None, "first!")
            .await
            .expect("comment");
    }
    assert_eq!(h.repo.counters(article).await.expect("counters").comments, 5);

    h.coordinator
        .cache_write(
            "articles:page:1",
            &vec![article],
            None,
            &[CacheTag::ArticlesPublic],
        )
        .await;

    h.coordinator
        .set_published(&author, article, false)
        .await
        .expect("unpublish");

    assert!(h.repo.comment_ids(article).await.is_empty());
    assert_eq!(h.repo.counters(article).await.expect("counters").comments, 0);
    assert_eq!(
        h.coordinator
            .cache_read::<Vec<Uuid>>("articles:page:1")
            .await,
        None
    );

    let result = h
        .coordinator
        .create_comment(&reader, article, None, "too late")
        .await;
    assert_eq!(forbidden(result), DenyReason::ForbiddenDraft);
}

#[tokio::test]
async fn like_then_dislike_then_dislike() {
    let h = Harness::new();
    let author = h.user(Role::Member).await;
    let reader = h.user(Role::SimpleUser).await;
    let article = h.repo.add_article(Some(&author), true).await;

    let counts = h
        .coordinator
        .toggle_reaction(article, &reader, ReactionKind::Like)
        .await
        .expect("like");
    assert_eq!(counts, ReactionCounts { likes: 1, dislikes: 0 });

    let counts = h
        .coordinator
        .toggle_reaction(article, &reader, ReactionKind::Dislike)
        .await
        .expect("swap");
    assert_eq!(counts, ReactionCounts { likes: 0, dislikes: 1 });
    assert_eq!(h.repo.reaction_rows(article).await.len(), 1);

    let counts = h
        .coordinator
        .toggle_reaction(article, &reader, ReactionKind::Dislike)
        .await
        .expect("clear");
    assert_eq!(counts, ReactionCounts::default());
    assert!(h.repo.reaction_rows(article).await.is_empty());
    assert_eq!(
        h.coordinator
            .ledger()
            .state(article, reader.id)
            .await
            .expect("state"),
        ReactionState::None
    );
}

#[tokio::test]
async fn admins_cannot_touch_peer_or_superior_comments() {
    let h = Harness::new();
    let primary = h.user(Role::PrimaryAdmin).await;
    let secondary = h.user(Role::SecondaryAdmin).await;
    let author = h.user(Role::Member).await;
    let article = h.repo.add_article(Some(&author), true).await;

    let by_primary = h
        .coordinator
        .create_comment(&primary, article, None, "from the top")
        .await
        .expect("comment");
    let by_secondary = h
        .coordinator
        .create_comment(&secondary, article, None, "middle")
        .await
        .expect("comment");

    let result = h.coordinator.delete_content(&secondary, by_primary.id).await;
    assert_eq!(forbidden(result), DenyReason::ForbiddenHierarchy);
    assert!(h.repo.contains(by_primary.id).await);

    let removed = h
        .coordinator
        .delete_content(&primary, by_secondary.id)
        .await
        .expect("primary may delete");
    assert_eq!(removed, 1);
    assert_eq!(h.repo.counters(article).await.expect("counters").comments, 1);
}

#[tokio::test]
async fn secondary_admin_moderates_members_only() {
    let h = Harness::new();
    let secondary = h.user(Role::SecondaryAdmin).await;
    let member = h.user(Role::Member).await;
    let simple = h.user(Role::SimpleUser).await;
    let article = h.repo.add_article(Some(&member), true).await;

    let member_comment = h.repo.add_comment(article, &member, None).await.expect("seed");
    let simple_comment = h.repo.add_comment(article, &simple, None).await.expect("seed");

    h.coordinator
        .delete_content(&secondary, member_comment)
        .await
        .expect("member content is moderated");

    let result = h.coordinator.delete_content(&secondary, simple_comment).await;
    assert_eq!(forbidden(result), DenyReason::ForbiddenNotOwner);
}

#[tokio::test]
async fn member_moderates_comments_under_own_article() {
    let h = Harness::new();
    let member = h.user(Role::Member).await;
    let other_member = h.user(Role::Member).await;
    let simple = h.user(Role::SimpleUser).await;
    let secondary = h.user(Role::SecondaryAdmin).await;

    let own_article = h.repo.add_article(Some(&member), true).await;
    let foreign_article = h.repo.add_article(Some(&other_member), true).await;

    let simple_comment = h
        .repo
        .add_comment(own_article, &simple, None)
        .await
        .expect("seed");
    let admin_comment = h
        .repo
        .add_comment(own_article, &secondary, None)
        .await
        .expect("seed");
    let foreign_comment = h
        .repo
        .add_comment(foreign_article, &simple, None)
        .await
        .expect("seed");

    h.coordinator
        .authorize(Some(&member), simple_comment, PolicyAction::ModerateComment)
        .await
        .expect("own article moderation");

    let result = h
        .coordinator
        .authorize(Some(&member), admin_comment, PolicyAction::ModerateComment)
        .await;
    assert_eq!(forbidden(result), DenyReason::ForbiddenHierarchy);

    let result = h.coordinator.delete_content(&member, foreign_comment).await;
    assert_eq!(forbidden(result), DenyReason::ForbiddenNotOwner);
}

#[tokio::test]
async fn deleting_a_thread_decrements_by_rows_removed() {
    let h = Harness::new();
    let author = h.user(Role::Member).await;
    let reader = h.user(Role::SimpleUser).await;
    let article = h.repo.add_article(Some(&author), true).await;

    let root = h
        .coordinator
        .create_comment(&reader, article, None, "root")
        .await
        .expect("root");
    h.coordinator
        .create_comment(&author, article, Some(root.id), "reply")
        .await
        .expect("reply");
    h.coordinator
        .create_comment(&author, article, None, "sibling")
        .await
        .expect("sibling");
    assert_eq!(h.repo.counters(article).await.expect("counters").comments, 3);

    let removed = h
        .coordinator
        .delete_content(&reader, root.id)
        .await
        .expect("author deletes own thread");
    assert_eq!(removed, 2);
    assert_eq!(h.repo.counters(article).await.expect("counters").comments, 1);
}

#[tokio::test]
async fn drafts_are_hidden_from_everyone_but_the_owner() {
    let h = Harness::new();
    let owner = h.user(Role::Member).await;
    let admin = h.user(Role::PrimaryAdmin).await;
    let draft = h.repo.add_article(Some(&owner), false).await;

    let result = h.coordinator.authorize(None, draft, PolicyAction::View).await;
    assert_eq!(forbidden(result), DenyReason::ForbiddenDraft);

    let result = h
        .coordinator
        .authorize(Some(&admin), draft, PolicyAction::View)
        .await;
    assert_eq!(forbidden(result), DenyReason::ForbiddenDraft);

    h.coordinator
        .authorize(Some(&owner), draft, PolicyAction::ViewDraft)
        .await
        .expect("owner reads own draft");

    let result = h
        .coordinator
        .toggle_reaction(draft, &owner, ReactionKind::Like)
        .await;
    assert_eq!(forbidden(result), DenyReason::ForbiddenDraft);

    let result = h
        .coordinator
        .register_view(None, draft, &ViewerHints::default())
        .await;
    assert_eq!(forbidden(result), DenyReason::ForbiddenDraft);
}

#[tokio::test]
async fn views_are_deduplicated_per_viewer_for_three_hours() {
    let h = Harness::new();
    let author = h.user(Role::Member).await;
    let article = h.repo.add_article(Some(&author), true).await;
    let hints = ViewerHints {
        forwarded_for: Some("198.51.100.4".to_string()),
        user_agent: Some("Mozilla/5.0".to_string()),
        ..Default::default()
    };

    assert!(h.coordinator.register_view(None, article, &hints).await.expect("view"));
    assert!(!h.coordinator.register_view(None, article, &hints).await.expect("view"));

    h.clock.advance(time::Duration::hours(2) + time::Duration::minutes(59));
    assert!(!h.coordinator.register_view(None, article, &hints).await.expect("view"));

    h.clock.advance(time::Duration::minutes(1));
    assert!(h.coordinator.register_view(None, article, &hints).await.expect("view"));

    let reader = h.user(Role::SimpleUser).await;
    assert!(
        h.coordinator
            .register_view(Some(&reader), article, &hints)
            .await
            .expect("view")
    );

    assert_eq!(h.repo.counters(article).await.expect("counters").views, 3);
}

#[tokio::test]
async fn updates_require_ownership_and_changes() {
    let h = Harness::new();
    let owner = h.user(Role::Member).await;
    let stranger = h.user(Role::SimpleUser).await;
    let article = h.repo.add_article(Some(&owner), true).await;
    let patch = ContentPatch {
        title: Some("Revised".to_string()),
        body: Some("New body".to_string()),
    };

    let result = h.coordinator.update_content(&stranger, article, &patch).await;
    assert_eq!(forbidden(result), DenyReason::ForbiddenNotOwner);

    let result = h
        .coordinator
        .update_content(&owner, article, &ContentPatch::default())
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    h.coordinator
        .update_content(&owner, article, &patch)
        .await
        .expect("owner edits");
    assert_eq!(
        h.repo.text_of(article).await,
        Some((Some("Revised".to_string()), "New body".to_string()))
    );
}

#[tokio::test]
async fn titling_a_comment_is_a_validation_error() {
    let h = Harness::new();
    let author = h.user(Role::Member).await;
    let article = h.repo.add_article(Some(&author), true).await;
    let comment = h
        .repo
        .add_comment(article, &author, None)
        .await
        .expect("seed comment");

    let titled = ContentPatch {
        title: Some("Not allowed".to_string()),
        body: None,
    };
    let result = h.coordinator.update_content(&author, comment, &titled).await;
    match result {
        Err(error @ AppError::Validation(_)) => assert_eq!(error.code(), "VALIDATION_FAILED"),
        other => panic!("expected validation error, got {other:?}"),
    }

    let body_only = ContentPatch {
        title: None,
        body: Some("Edited".to_string()),
    };
    h.coordinator
        .update_content(&author, comment, &body_only)
        .await
        .expect("body edit");
    assert_eq!(
        h.repo.text_of(comment).await,
        Some((None, "Edited".to_string()))
    );
}

#[tokio::test]
async fn missing_targets_and_actors_are_not_found() {
    let h = Harness::new();
    let author = h.user(Role::Member).await;
    let article = h.repo.add_article(Some(&author), true).await;

    let result = h
        .coordinator
        .toggle_reaction(Uuid::new_v4(), &author, ReactionKind::Like)
        .await;
    assert_eq!(result.map_err(|err| err.code()), Err("NOT_FOUND"));

    let ghost = h.user(Role::SimpleUser).await;
    h.repo.remove_user(ghost.id).await;
    let result = h
        .coordinator
        .toggle_reaction(article, &ghost, ReactionKind::Like)
        .await;
    assert!(matches!(
        result,
        Err(AppError::NotFound { entity: "user", .. })
    ));

    let result = h.coordinator.delete_content(&author, Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::NotFound { .. })));
}

#[tokio::test]
async fn article_detail_cache_is_dropped_on_update() {
    let h = Harness::new();
    let owner = h.user(Role::Member).await;
    let article = h.repo.add_article(Some(&owner), true).await;
    let key = article_key(article);

    let first: Result<String, AppError> = h
        .coordinator
        .cached(&key, None, &[CacheTag::Article(article)], || async {
            Ok("v1".to_string())
        })
        .await;
    assert_eq!(first.expect("first"), "v1");

    let stale: Result<String, AppError> = h
        .coordinator
        .cached(&key, None, &[CacheTag::Article(article)], || async {
            Ok("v2".to_string())
        })
        .await;
    assert_eq!(stale.expect("cached"), "v1");

    h.coordinator
        .update_content(
            &owner,
            article,
            &ContentPatch {
                body: Some("edited".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("update");

    let fresh: Result<String, AppError> = h
        .coordinator
        .cached(&key, None, &[CacheTag::Article(article)], || async {
            Ok("v2".to_string())
        })
        .await;
    assert_eq!(fresh.expect("recomputed"), "v2");
}
