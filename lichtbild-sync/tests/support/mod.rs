//! Shared fixtures: a seeded world, per-user auth bindings, and store
//! wrappers for fault injection and in-flight gating.

// Each test binary uses its own slice of these fixtures.
#![allow(dead_code)]

use async_trait::async_trait;
use lichtbild_common::{
    model::{
        Id,
        post::{PageKey, Post, PostMarker},
        user::{User, UserMarker},
    },
    snowflake::NodeId,
};
use lichtbild_store::{
    document::{CommentDocument, PostDocument},
    memory::MemoryStore,
    store::{
        FeedScope, MembershipField, MembershipOp, PostStore, Result, StoreError, StoredPost,
        Revision,
    },
};
use lichtbild_sync::{
    auth::{AuthService, DirectoryAuthService, SessionBinding},
    config::SyncConfig,
    mint::IdMint,
    view::FeedView,
};
use std::{
    collections::BTreeSet,
    num::NonZeroU32,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use time::UtcDateTime;
use tokio::sync::Semaphore;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lichtbild_sync=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn mint() -> Arc<IdMint> {
    Arc::new(IdMint::new(NodeId::new_unchecked(1)))
}

/// One auth service per user, all over the same user directory, the way
/// two signed-in browser tabs share a backend.
pub async fn signed_in(
    users: &Arc<MemoryStore>,
    mint: &Arc<IdMint>,
    email: &str,
    name: &str,
) -> (User, SessionBinding) {
    let auth = DirectoryAuthService::new(Arc::clone(users), Arc::clone(mint));
    let session = auth
        .sign_up(email, "secret99", name)
        .await
        .expect("sign up fixture");
    (session.user, auth.binding())
}

pub fn global_view<S: PostStore>(
    store: &Arc<S>,
    binding: &SessionBinding,
    mint: &Arc<IdMint>,
) -> FeedView<S> {
    FeedView::new(
        FeedScope::Global,
        Arc::clone(store),
        binding.clone(),
        Arc::clone(mint),
        SyncConfig::default(),
    )
}

pub fn scoped_view<S: PostStore>(
    scope: FeedScope,
    store: &Arc<S>,
    binding: &SessionBinding,
    mint: &Arc<IdMint>,
) -> FeedView<S> {
    FeedView::new(
        scope,
        Arc::clone(store),
        binding.clone(),
        Arc::clone(mint),
        SyncConfig::default(),
    )
}

/// Writes a bare caption post directly, minting its id at `at`.
pub async fn seed_post<S: PostStore>(
    store: &S,
    mint: &IdMint,
    author: Id<UserMarker>,
    caption: &str,
    at: UtcDateTime,
) -> Id<PostMarker> {
    let id: Id<PostMarker> = mint.mint_at(at);
    let post = Post {
        id,
        author_id: author,
        image: None,
        caption: Some(caption.to_owned()),
        created_at: id.snowflake().created_at(),
        liked_by: BTreeSet::new(),
        saved_by: BTreeSet::new(),
        comments: Vec::new(),
        file_name: None,
        file_type: None,
    };

    store
        .insert(id, PostDocument::from(&post))
        .await
        .expect("seed post");
    id
}

/// Store wrapper that fails every operation while the switch is on.
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected outage".to_owned()))
        } else {
            Ok(())
        }
    }
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostStore for FlakyStore {
    async fn query_page(
        &self,
        scope: FeedScope,
        after: Option<PageKey>,
        limit: Option<NonZeroU32>,
    ) -> Result<Vec<StoredPost>> {
        self.check()?;
        self.inner.query_page(scope, after, limit).await
    }

    async fn get(&self, id: Id<PostMarker>) -> Result<Option<StoredPost>> {
        self.check()?;
        self.inner.get(id).await
    }

    async fn insert(&self, id: Id<PostMarker>, document: PostDocument) -> Result<()> {
        self.check()?;
        self.inner.insert(id, document).await
    }

    async fn update_membership(
        &self,
        id: Id<PostMarker>,
        field: MembershipField,
        op: MembershipOp,
        user: Id<UserMarker>,
    ) -> Result<()> {
        self.check()?;
        self.inner.update_membership(id, field, op, user).await
    }

    async fn append_comment(&self, id: Id<PostMarker>, comment: CommentDocument) -> Result<()> {
        self.check()?;
        self.inner.append_comment(id, comment).await
    }

    async fn replace_comments(
        &self,
        id: Id<PostMarker>,
        expected: Revision,
        comments: Vec<CommentDocument>,
    ) -> Result<()> {
        self.check()?;
        self.inner.replace_comments(id, expected, comments).await
    }

    async fn delete(&self, id: Id<PostMarker>) -> Result<()> {
        self.check()?;
        self.inner.delete(id).await
    }
}

/// Store wrapper that parks queries behind a gate while closed.
pub struct GatedStore {
    inner: MemoryStore,
    gated: AtomicBool,
    gate: Semaphore,
}

impl GatedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn close_gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn open_gate(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.add_permits(1);
    }

    async fn wait(&self) {
        if self.gated.load(Ordering::SeqCst) {
            let _permit = self.gate.acquire().await.expect("gate closed");
        }
    }
}

impl Default for GatedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostStore for GatedStore {
    async fn query_page(
        &self,
        scope: FeedScope,
        after: Option<PageKey>,
        limit: Option<NonZeroU32>,
    ) -> Result<Vec<StoredPost>> {
        self.wait().await;
        self.inner.query_page(scope, after, limit).await
    }

    async fn get(&self, id: Id<PostMarker>) -> Result<Option<StoredPost>> {
        self.inner.get(id).await
    }

    async fn insert(&self, id: Id<PostMarker>, document: PostDocument) -> Result<()> {
        self.inner.insert(id, document).await
    }

    async fn update_membership(
        &self,
        id: Id<PostMarker>,
        field: MembershipField,
        op: MembershipOp,
        user: Id<UserMarker>,
    ) -> Result<()> {
        self.inner.update_membership(id, field, op, user).await
    }

    async fn append_comment(&self, id: Id<PostMarker>, comment: CommentDocument) -> Result<()> {
        self.inner.append_comment(id, comment).await
    }

    async fn replace_comments(
        &self,
        id: Id<PostMarker>,
        expected: Revision,
        comments: Vec<CommentDocument>,
    ) -> Result<()> {
        self.inner.replace_comments(id, expected, comments).await
    }

    async fn delete(&self, id: Id<PostMarker>) -> Result<()> {
        self.inner.delete(id).await
    }
}
