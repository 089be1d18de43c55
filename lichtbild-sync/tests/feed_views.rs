//! Feed pagination and the post lifecycle across views.

mod support;

use lichtbild_store::{memory::MemoryStore, store::FeedScope, store::PostStore};
use lichtbild_sync::{
    SyncError,
    auth::{AuthService, DirectoryAuthService},
    compose::NewPost,
    error::ErrorKind,
};
use std::sync::Arc;
use support::{FlakyStore, global_view, mint, scoped_view, seed_post, signed_in};
use time::{Duration, macros::utc_datetime};

#[tokio::test]
async fn pagination_returns_every_post_exactly_once() {
    support::init_tracing();
    let mint = mint();
    let users = Arc::new(MemoryStore::new());
    let posts = Arc::new(MemoryStore::new());
    let (alice, binding) = signed_in(&users, &mint, "alice@example.com", "Alice").await;

    let base = utc_datetime!(2026-01-01 09:00);
    for index in 0..12 {
        seed_post(
            &*posts,
            &mint,
            alice.id,
            &format!("post {index}"),
            base + Duration::minutes(index),
        )
        .await;
    }

    let view = global_view(&posts, &binding, &mint);
    view.refresh().await.unwrap();
    assert_eq!(view.posts().len(), 5);
    assert!(view.has_more());

    let mut pages = 1;
    while view.has_more() {
        view.load_more().await.unwrap();
        pages += 1;
    }

    let shown = view.posts();
    assert_eq!(pages, 3);
    assert_eq!(shown.len(), 12);

    // Exactly once, strictly newest first.
    for window in shown.windows(2) {
        assert!(window[0].page_key() > window[1].page_key());
    }
    assert_eq!(shown[0].caption.as_deref(), Some("post 11"));
    assert_eq!(shown[11].caption.as_deref(), Some("post 0"));

    assert!(matches!(
        view.load_more().await,
        Err(SyncError::Exhausted)
    ));
}

#[tokio::test]
async fn empty_feed_is_exhausted_without_error() {
    let mint = mint();
    let users = Arc::new(MemoryStore::new());
    let posts = Arc::new(MemoryStore::new());
    let (_alice, binding) = signed_in(&users, &mint, "alice@example.com", "Alice").await;

    let view = global_view(&posts, &binding, &mint);
    view.refresh().await.unwrap();

    assert!(view.posts().is_empty());
    assert!(!view.has_more());
}

#[tokio::test]
async fn creating_a_post_restarts_the_view_at_the_first_page() {
    let mint = mint();
    let users = Arc::new(MemoryStore::new());
    let posts = Arc::new(MemoryStore::new());
    let (alice, binding) = signed_in(&users, &mint, "alice@example.com", "Alice").await;

    let base = utc_datetime!(2026-01-01 09:00);
    for index in 0..7 {
        seed_post(
            &*posts,
            &mint,
            alice.id,
            &format!("post {index}"),
            base + Duration::minutes(index),
        )
        .await;
    }

    let view = global_view(&posts, &binding, &mint);
    view.refresh().await.unwrap();
    view.load_more().await.unwrap();
    assert_eq!(view.posts().len(), 7);

    let created = view
        .create_post(NewPost {
            image: None,
            caption: Some("fresh".to_owned()),
        })
        .await
        .unwrap();

    // Back to a single first page, new post on top.
    let shown = view.posts();
    assert_eq!(shown.len(), 5);
    assert_eq!(shown[0].id, created);
    assert!(view.has_more());
}

#[tokio::test]
async fn my_posts_view_only_shows_the_owner() {
    let mint = mint();
    let users = Arc::new(MemoryStore::new());
    let posts = Arc::new(MemoryStore::new());
    let (alice, alice_binding) = signed_in(&users, &mint, "alice@example.com", "Alice").await;
    let (bob, _) = signed_in(&users, &mint, "bob@example.com", "Bob").await;

    let base = utc_datetime!(2026-01-01 09:00);
    seed_post(&*posts, &mint, alice.id, "mine", base).await;
    seed_post(&*posts, &mint, bob.id, "theirs", base + Duration::minutes(1)).await;

    let view = scoped_view(FeedScope::Author(alice.id), &posts, &alice_binding, &mint);
    view.refresh().await.unwrap();

    let shown = view.posts();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].caption.as_deref(), Some("mine"));
    assert!(!view.has_more());
}

#[tokio::test]
async fn post_lifecycle_like_comment_delete() {
    let mint = mint();
    let users = Arc::new(MemoryStore::new());
    let posts = Arc::new(MemoryStore::new());
    let (alice, alice_binding) = signed_in(&users, &mint, "alice@example.com", "Alice").await;
    let (bob, bob_binding) = signed_in(&users, &mint, "bob@example.com", "Bob").await;
    let (carla, carla_binding) = signed_in(&users, &mint, "carla@example.com", "Carla").await;

    let alice_view = global_view(&posts, &alice_binding, &mint);
    let post_id = alice_view
        .create_post(NewPost {
            image: None,
            caption: Some("hello".to_owned()),
        })
        .await
        .unwrap();

    // Bob likes, then unlikes: membership ends where it started.
    let bob_view = global_view(&posts, &bob_binding, &mint);
    bob_view.refresh().await.unwrap();
    assert!(bob_view.toggle_like(post_id).await.unwrap());
    assert_eq!(
        posts.get(post_id).await.unwrap().unwrap().document.likes,
        [u64::from(bob.id)]
    );
    assert!(!bob_view.toggle_like(post_id).await.unwrap());
    assert!(posts.get(post_id).await.unwrap().unwrap().document.likes.is_empty());

    // Carla comments.
    let carla_view = global_view(&posts, &carla_binding, &mint);
    carla_view.refresh().await.unwrap();
    carla_view.add_comment(post_id, "nice").await.unwrap();

    let stored = posts.get(post_id).await.unwrap().unwrap();
    assert_eq!(stored.document.comments.len(), 1);
    assert_eq!(stored.document.comments[0].user_id, u64::from(carla.id));
    assert_eq!(stored.document.comments[0].text, "nice");
    assert!(stored.document.comments[0].replies.is_empty());

    // Only the author may delete.
    assert!(matches!(
        bob_view.delete_post(post_id).await,
        Err(SyncError::NotAuthor)
    ));
    assert!(posts.get(post_id).await.unwrap().is_some());

    alice_view.delete_post(post_id).await.unwrap();
    assert!(posts.get(post_id).await.unwrap().is_none());
    assert!(alice_view.posts().is_empty());
}

#[tokio::test]
async fn unauthenticated_mutations_are_rejected() {
    let mint = mint();
    let users = Arc::new(MemoryStore::new());
    let posts = Arc::new(MemoryStore::new());
    let (alice, binding) = signed_in(&users, &mint, "alice@example.com", "Alice").await;
    let post_id = seed_post(&*posts, &mint, alice.id, "hello", utc_datetime!(2026-01-01 09:00)).await;

    let view = global_view(&posts, &binding, &mint);
    view.refresh().await.unwrap();

    // A binding that never saw a sign-in.
    let auth = DirectoryAuthService::new(Arc::clone(&users), Arc::clone(&mint));
    let signed_out_view = global_view(&posts, &auth.binding(), &mint);
    signed_out_view.refresh().await.unwrap();

    let denied = signed_out_view.toggle_like(post_id).await;
    assert!(matches!(denied, Err(SyncError::NotSignedIn)));
    assert!(posts.get(post_id).await.unwrap().unwrap().document.likes.is_empty());
}

#[tokio::test]
async fn failed_initial_fetch_leaves_an_empty_view() {
    let mint = mint();
    let users = Arc::new(MemoryStore::new());
    let store = Arc::new(FlakyStore::new());
    let (_alice, binding) = signed_in(&users, &mint, "alice@example.com", "Alice").await;

    store.set_failing(true);
    let view = global_view(&store, &binding, &mint);

    let error = view.refresh().await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Network);
    assert!(error.is_retryable());
    assert!(view.posts().is_empty());

    // The user-initiated retry succeeds once the backend is back.
    store.set_failing(false);
    view.refresh().await.unwrap();
    assert!(view.posts().is_empty());
    assert!(!view.has_more());
}
