mod support;

use std::sync::Arc;

use futures::future::join_all;
use inkpost::application::repos::ContentRepo;
use inkpost::domain::entities::ReactionCounts;
use inkpost::domain::types::{CounterField, ReactionKind, Role};
use support::Harness;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_toggles_by_distinct_actors_stay_exact() {
    let h = Arc::new(Harness::new());
    let author = h.user(Role::Member).await;
    let article = h.repo.add_article(Some(&author), true).await;

    let mut actors = Vec::new();
    for index in 0..40 {
        let role = if index % 2 == 0 {
            Role::SimpleUser
        } else {
            Role::Member
        };
        actors.push(h.user(role).await);
    }

    let presses = actors.iter().enumerate().map(|(index, actor)| {
        let h = h.clone();
        let actor = *actor;
        let kind = if index % 4 == 0 {
            ReactionKind::Dislike
        } else {
            ReactionKind::Like
        };
        tokio::spawn(async move {
            h.coordinator
                .toggle_reaction(article, &actor, kind)
                .await
                .expect("toggle")
        })
    });
    for result in join_all(presses).await {
        result.expect("task");
    }

    let counters = h.repo.counters(article).await.expect("counters");
    assert_eq!(counters.reactions(), ReactionCounts { likes: 30, dislikes: 10 });
    assert_eq!(h.repo.reaction_rows(article).await.len(), 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_presses_by_one_actor_never_double_count() {
    let h = Arc::new(Harness::new());
    let author = h.user(Role::Member).await;
    let reader = h.user(Role::SimpleUser).await;
    let article = h.repo.add_article(Some(&author), true).await;

    let presses = (0..25).map(|index| {
        let h = h.clone();
        let kind = if index % 3 == 0 {
            ReactionKind::Dislike
        } else {
            ReactionKind::Like
        };
        tokio::spawn(async move {
            h.coordinator
                .toggle_reaction(article, &reader, kind)
                .await
                .expect("toggle")
        })
    });
    for result in join_all(presses).await {
        result.expect("task");
    }

    let counts = h.repo.counters(article).await.expect("counters").reactions();
    let rows = h.repo.reaction_rows(article).await;
    assert!(rows.len() <= 1);
    let expected = match rows.first().map(|row| row.kind) {
        None => ReactionCounts::default(),
        Some(ReactionKind::Like) => ReactionCounts { likes: 1, dislikes: 0 },
        Some(ReactionKind::Dislike) => ReactionCounts { likes: 0, dislikes: 1 },
    };
    assert_eq!(counts, expected);
}

#[tokio::test]
async fn counters_never_go_negative_after_drift() {
    let h = Harness::new();
    let author = h.user(Role::Member).await;
    let reader = h.user(Role::SimpleUser).await;
    let article = h.repo.add_article(Some(&author), true).await;

    h.coordinator
        .toggle_reaction(article, &reader, ReactionKind::Like)
        .await
        .expect("like");
    // Simulate an out-of-band reset that lost the like.
    h.repo
        .reset_counter(article, CounterField::Likes, 0)
        .await
        .expect("reset");

    let counts = h
        .coordinator
        .toggle_reaction(article, &reader, ReactionKind::Like)
        .await
        .expect("unlike");
    assert_eq!(counts, ReactionCounts::default());
}

#[tokio::test]
async fn reconcile_repairs_drifted_counters() {
    let h = Harness::new();
    let author = h.user(Role::Member).await;
    let article = h.repo.add_article(Some(&author), true).await;
    for role in [Role::SimpleUser, Role::Member, Role::SecondaryAdmin] {
        let actor = h.user(role).await;
        h.coordinator
            .toggle_reaction(article, &actor, ReactionKind::Like)
            .await
            .expect("like");
    }
    let dissenter = h.user(Role::SimpleUser).await;
    h.coordinator
        .toggle_reaction(article, &dissenter, ReactionKind::Dislike)
        .await
        .expect("dislike");

    h.repo
        .reset_counter(article, CounterField::Likes, 17)
        .await
        .expect("drift");
    h.repo
        .reset_counter(article, CounterField::Dislikes, 0)
        .await
        .expect("drift");

    let repaired = h.coordinator.ledger().reconcile(article).await.expect("reconcile");
    assert_eq!(repaired, ReactionCounts { likes: 3, dislikes: 1 });
    assert_eq!(
        h.repo.counters(article).await.expect("counters").reactions(),
        repaired
    );
}

#[tokio::test]
async fn comments_carry_their_own_reactions() {
    let h = Harness::new();
    let author = h.user(Role::Member).await;
    let reader = h.user(Role::SimpleUser).await;
    let article = h.repo.add_article(Some(&author), true).await;
    let comment = h.repo.add_comment(article, &author, None).await.expect("seed");

    let counts = h
        .coordinator
        .toggle_reaction(comment, &reader, ReactionKind::Like)
        .await
        .expect("like comment");
    assert_eq!(counts.likes, 1);
    assert_eq!(h.repo.counters(article).await.expect("counters").likes, 0);
}
