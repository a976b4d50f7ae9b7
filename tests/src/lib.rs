//! Cross-crate integration tests: the comment-thread engine driven against
//! the in-memory mock server, plus randomized checks of the tree invariants.
#![cfg(test)]

use banter_api::{
    epoch, page_from_payload, Comment, CommentId, NotifyKind, PostId, UserId, UserLite,
};
use banter_client::{
    build_tree, search_users_cached, CommentNode, CommentThread, MentionCache, Mutation,
};
use banter_mock_server::{MockServer, Op};
use chrono::Duration;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn viewer() -> UserLite {
    UserLite::new(UserId(String::from("u-viewer")), "viewer")
}

fn other(id: &str) -> UserLite {
    UserLite::new(UserId(format!("u-{id}")), id)
}

fn post() -> PostId {
    PostId(String::from("p1"))
}

fn cid(id: &str) -> CommentId {
    CommentId(String::from(id))
}

fn comment(id: &str, parent: Option<&str>, author: &UserLite, minutes: i64) -> Comment {
    Comment {
        id: cid(id),
        parent_id: parent.map(cid),
        author: author.clone(),
        body: format!("body {id}"),
        created_at: epoch() + Duration::minutes(minutes),
        is_liked: false,
        like_count: 0,
    }
}

/// Server with `n` root comments by another user, and an engine that has
/// already fetched them.
async fn seeded(n: usize) -> (MockServer, CommentThread) {
    let server = MockServer::new(viewer());
    server.add_post(post());
    let alice = other("alice");
    for i in 0..n {
        server.seed_comment(&post(), comment(&format!("c{i}"), None, &alice, i as i64));
    }
    let mut thread = CommentThread::new(post(), viewer());
    thread.refresh(&server).await.expect("initial fetch");
    (server, thread)
}

#[tokio::test]
async fn refresh_loads_the_page() {
    let (_server, thread) = seeded(3).await;
    assert_eq!(thread.comments().len(), 3);
    assert_eq!(thread.total_count(), 3);
    assert_eq!(thread.tree().len(), 3);
}

#[tokio::test]
async fn create_commits_and_reconciles_by_refetch() {
    let (server, mut thread) = seeded(1).await;
    let committed = thread
        .apply(
            &server,
            Mutation::Create {
                parent_id: None,
                body: String::from("hello there"),
                mentions: Vec::new(),
            },
        )
        .await;
    assert!(committed);
    // the placeholder never survives a committed create
    assert!(thread.comments().iter().all(|c| !c.id.is_placeholder()));
    assert!(thread.comments().iter().any(|c| c.id == cid("srv-1")));
    assert_eq!(thread.total_count(), 2);
    assert_eq!(server.test_comments(&post()).len(), 2);
}

#[tokio::test]
async fn create_reply_notifies_mentions_and_parent_author() {
    let (server, mut thread) = seeded(1).await;
    let bob = other("bob");
    let committed = thread
        .apply(
            &server,
            Mutation::Create {
                parent_id: Some(cid("c0")),
                body: String::from("@bob look at this"),
                mentions: vec![bob.clone()],
            },
        )
        .await;
    assert!(committed);

    let notifications = server.test_notifications();
    assert_eq!(notifications.len(), 2);
    assert_eq!(notifications[0].0, bob.id);
    assert_eq!(notifications[0].1, NotifyKind::Mention);
    // c0's author gets the reply ping
    assert_eq!(notifications[1].0, other("alice").id);
    assert_eq!(notifications[1].1, NotifyKind::Reply);
    // both carry the server-assigned comment id
    assert_eq!(notifications[0].2.comment, cid("srv-1"));

    // and the reply is threaded under c0 after the refetch
    let forest = thread.tree();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].children.len(), 1);
    assert_eq!(forest[0].children[0].comment.id, cid("srv-1"));
}

#[tokio::test]
async fn create_failure_removes_the_placeholder() {
    let (server, mut thread) = seeded(2).await;
    server.fail_next(Op::Create);
    let committed = thread
        .apply(
            &server,
            Mutation::Create {
                parent_id: None,
                body: String::from("doomed"),
                mentions: Vec::new(),
            },
        )
        .await;
    assert!(!committed);
    assert_eq!(thread.comments().len(), 2);
    assert_eq!(thread.total_count(), 2);
    assert_eq!(server.test_comments(&post()).len(), 2);
}

#[tokio::test]
async fn notify_failure_never_fails_the_create() {
    let (server, mut thread) = seeded(0).await;
    server.fail_next(Op::Notify);
    let committed = thread
        .apply(
            &server,
            Mutation::Create {
                parent_id: None,
                body: String::from("hi @bob"),
                mentions: vec![other("bob")],
            },
        )
        .await;
    assert!(committed);
    assert!(server.test_notifications().is_empty());
    assert_eq!(server.test_comments(&post()).len(), 1);
}

#[tokio::test]
async fn like_commits_and_survives_a_refresh() {
    let (server, mut thread) = seeded(1).await;
    assert!(
        thread
            .apply(&server, Mutation::ToggleLike { comment_id: cid("c0") })
            .await
    );
    assert!(thread.comments()[0].is_liked);
    assert_eq!(thread.comments()[0].like_count, 1);

    thread.refresh(&server).await.unwrap();
    assert!(thread.comments()[0].is_liked);
    assert_eq!(thread.comments()[0].like_count, 1);

    // toggling again unlikes
    assert!(
        thread
            .apply(&server, Mutation::ToggleLike { comment_id: cid("c0") })
            .await
    );
    thread.refresh(&server).await.unwrap();
    assert!(!thread.comments()[0].is_liked);
    assert_eq!(thread.comments()[0].like_count, 0);
}

#[tokio::test]
async fn like_failure_restores_the_exact_snapshot() {
    let server = MockServer::new(viewer());
    server.add_post(post());
    server.seed_comment(
        &post(),
        Comment {
            like_count: 5,
            ..comment("c0", None, &other("alice"), 0)
        },
    );
    let mut thread = CommentThread::new(post(), viewer());
    thread.refresh(&server).await.unwrap();

    server.fail_next(Op::Like);
    let committed = thread
        .apply(&server, Mutation::ToggleLike { comment_id: cid("c0") })
        .await;
    assert!(!committed);
    assert!(!thread.comments()[0].is_liked);
    assert_eq!(thread.comments()[0].like_count, 5);
    assert!(!thread.is_mutation_pending(&cid("c0")));
}

#[tokio::test]
async fn edit_encodes_on_the_wire_and_refetches() {
    let (server, mut thread) = seeded(1).await;
    let committed = thread
        .apply(
            &server,
            Mutation::Edit {
                comment_id: cid("c0"),
                new_body: String::from("héllo 🔥"),
            },
        )
        .await;
    assert!(committed);

    let wire = server.test_last_wire_body().expect("edit hit the wire");
    assert!(wire.is_ascii(), "wire body should be entity-encoded: {wire:?}");
    assert_eq!(wire, "h&#233;llo &#128293;");
    // refetched body comes back decoded for display
    assert_eq!(thread.comments()[0].body, "héllo 🔥");
}

#[tokio::test]
async fn edit_failure_restores_the_body() {
    let (server, mut thread) = seeded(1).await;
    server.fail_next(Op::Edit);
    let committed = thread
        .apply(
            &server,
            Mutation::Edit {
                comment_id: cid("c0"),
                new_body: String::from("never happened"),
            },
        )
        .await;
    assert!(!committed);
    assert_eq!(thread.comments()[0].body, "body c0");
    assert_eq!(server.test_comments(&post())[0].body, "body c0");
}

#[tokio::test]
async fn delete_commits_on_both_sides() {
    let (server, mut thread) = seeded(3).await;
    assert!(
        thread
            .apply(&server, Mutation::Delete { comment_id: cid("c1") })
            .await
    );
    assert_eq!(thread.comments().len(), 2);
    assert_eq!(server.test_comments(&post()).len(), 2);
    assert!(thread.comments().iter().all(|c| c.id != cid("c1")));
}

#[tokio::test]
async fn delete_failure_reinserts_at_the_original_index() {
    let (server, mut thread) = seeded(5).await;
    server.fail_next(Op::Delete);
    let committed = thread
        .apply(&server, Mutation::Delete { comment_id: cid("c2") })
        .await;
    assert!(!committed);
    assert_eq!(thread.comments().len(), 5);
    assert_eq!(thread.comments()[2].id, cid("c2"));
}

#[tokio::test]
async fn refetch_failure_after_commit_keeps_optimistic_state() {
    let (server, mut thread) = seeded(0).await;
    server.fail_next(Op::Fetch);
    let committed = thread
        .apply(
            &server,
            Mutation::Create {
                parent_id: None,
                body: String::from("committed but not yet reconciled"),
                mentions: Vec::new(),
            },
        )
        .await;
    // the create itself went through, so this is a success
    assert!(committed);
    assert_eq!(thread.comments().len(), 1);
    assert!(thread.comments()[0].id.is_placeholder());

    // the next successful refresh reconciles
    thread.refresh(&server).await.unwrap();
    assert_eq!(thread.comments().len(), 1);
    assert_eq!(thread.comments()[0].id, cid("srv-1"));
}

#[tokio::test]
async fn mention_search_flows_through_the_cache() {
    let server = MockServer::new(viewer());
    server.add_user(other("bob"));
    server.add_user(other("bobby"));
    server.add_user(other("carol"));

    let mut cache = MentionCache::new();
    let hits = search_users_cached(&server, &mut cache, "bob").await.unwrap();
    assert_eq!(hits.len(), 2);

    server.fail_next(Op::Search);
    // cached fragment never reaches the failing store
    let again = search_users_cached(&server, &mut cache, "BOB").await.unwrap();
    assert_eq!(again, hits);
    // a fresh fragment does, and the failure surfaces
    assert!(search_users_cached(&server, &mut cache, "car").await.is_err());
}

#[test]
fn adapted_payload_threads_correctly() {
    let page = page_from_payload(&serde_json::json!({
        "total_count": 3,
        "comments": [
            {"id": 1, "parent_id": "0", "body": "root", "author": "alice",
             "created_at": "2024-01-01T10:00:00Z"},
            {"id": "2", "parent_id": 1, "body": "reply &#128077;", "author": "bob",
             "created_at": "2024-01-01T11:00:00Z"},
            {"id": 3, "parent_id": "nan", "body": "another root", "author": "carol",
             "created_at": "2024-01-02T08:00:00Z"},
        ],
    }));
    let forest = build_tree(&page.comments);
    assert_eq!(forest.len(), 2);
    assert_eq!(forest[0].comment.id, cid("3"));
    assert_eq!(forest[1].comment.id, cid("1"));
    assert_eq!(forest[1].children[0].comment.id, cid("2"));
    assert_eq!(forest[1].children[0].comment.body, "reply 👍");
}

fn check_invariants(flat: &[Comment], forest: &[CommentNode]) {
    let total: usize = forest.iter().map(CommentNode::total_count).sum();
    assert_eq!(total, flat.len(), "totality violated");
    for w in forest.windows(2) {
        assert!(
            w[0].comment.created_at >= w[1].comment.created_at,
            "roots must be newest-first"
        );
    }
    fn check_children(nodes: &[CommentNode]) {
        for n in nodes {
            for w in n.children.windows(2) {
                assert!(
                    w[0].comment.created_at <= w[1].comment.created_at,
                    "children must be oldest-first"
                );
            }
            check_children(&n.children);
        }
    }
    check_children(forest);
}

#[test]
fn randomized_trees_hold_the_invariants() {
    let mut rng = StdRng::seed_from_u64(42);
    let sentinels = ["", "0", "null", "undefined", "NaN"];
    let alice = other("alice");
    for _ in 0..50 {
        let n = rng.gen_range(0..120);
        let mut flat = Vec::with_capacity(n);
        for i in 0..n {
            // parents: none, an earlier comment, a sentinel, or dangling
            let parent = match rng.gen_range(0..5) {
                0 => None,
                1 | 2 if i > 0 => Some(format!("c{}", rng.gen_range(0..i))),
                3 => Some(String::from(sentinels[rng.gen_range(0..sentinels.len())])),
                _ => Some(String::from("ghost")),
            };
            // a small timestamp range forces plenty of ties
            let minutes = rng.gen_range(0..8);
            flat.push(comment(
                &format!("c{i}"),
                parent.as_deref(),
                &alice,
                minutes,
            ));
        }
        let forest = build_tree(&flat);
        check_invariants(&flat, &forest);
        // pure: same input, same forest
        assert_eq!(forest, build_tree(&flat));
    }
}
