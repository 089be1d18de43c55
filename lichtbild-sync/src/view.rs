//! Per-screen view synchronization.
//!
//! Each screen owns one [`FeedView`] over its slice of the posts
//! collection. User actions update the local copy first and mirror the
//! change to the store; a confirmed remote failure reverts exactly the
//! field the action touched. Views are independent of each other and
//! re-synchronize only on their own fetches.

use crate::{
    auth::SessionBinding,
    compose::{self, NewPost},
    config::SyncConfig,
    cursor::FeedCursor,
    error::{Result, SyncError},
    mint::IdMint,
};
use lichtbild_common::model::{
    Id, ModelValidationError,
    comment::{Comment, CommentMarker, CommentText},
    post::{Post, PostMarker},
    user::User,
};
use lichtbild_store::{
    document::PostDocument,
    store::{BlobStore, FeedScope, MembershipField, MembershipOp, PostStore, StoreError},
};
use std::{
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug)]
struct ViewState {
    posts: Vec<Post>,
    cursor: FeedCursor,
}

pub struct FeedView<S> {
    scope: FeedScope,
    store: Arc<S>,
    blob_store: Option<Arc<dyn BlobStore>>,
    session: SessionBinding,
    mint: Arc<IdMint>,
    config: SyncConfig,
    state: Mutex<ViewState>,
    // Fetches capture the generation they started under and only apply if
    // it has not moved on; dispose and refresh both move it.
    generation: AtomicU64,
    disposal: CancellationToken,
}

impl<S: PostStore> FeedView<S> {
    #[must_use]
    pub fn new(
        scope: FeedScope,
        store: Arc<S>,
        session: SessionBinding,
        mint: Arc<IdMint>,
        config: SyncConfig,
    ) -> Self {
        let page_size = match scope {
            FeedScope::Global => Some(config.page_size),
            FeedScope::Author(_) | FeedScope::SavedBy(_) => None,
        };

        Self {
            scope,
            store,
            blob_store: None,
            session,
            mint,
            config,
            state: Mutex::new(ViewState {
                posts: Vec::new(),
                cursor: FeedCursor::new(scope, page_size),
            }),
            generation: AtomicU64::new(0),
            disposal: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_blob_store(mut self, blob_store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(blob_store);
        self
    }

    #[must_use]
    pub fn scope(&self) -> FeedScope {
        self.scope
    }

    /// Snapshot of the posts this view currently shows.
    #[must_use]
    pub fn posts(&self) -> Vec<Post> {
        self.state().posts.clone()
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.state().cursor.has_more()
    }

    /// Invalidates the view: any fetch still in flight is discarded when
    /// it resolves.
    pub fn dispose(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.disposal.cancel();
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposal.is_cancelled()
    }

    /// (Re)loads the first page, dropping whatever the view showed.
    pub async fn refresh(&self) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // first_page restarts the chain; the clone keeps the shown state
        // untouched until the result is in.
        let mut cursor = self.state().cursor.clone();

        let page = tokio::select! {
            () = self.disposal.cancelled() => return Ok(()),
            page = self.bounded(cursor.first_page(&*self.store)) => page?,
        };

        let mut state = self.state();
        if self.generation.load(Ordering::SeqCst) == generation && !self.is_disposed() {
            state.posts = page.posts;
            state.cursor = cursor;
        } else {
            debug!(scope = ?self.scope, "Discarding superseded first page");
        }
        Ok(())
    }

    /// Fetches and appends the next page of the current chain.
    pub async fn load_more(&self) -> Result<()> {
        let generation = self.generation.load(Ordering::SeqCst);
        let snapshot = self.state().cursor.clone();
        let mut cursor = snapshot.clone();

        let page = tokio::select! {
            () = self.disposal.cancelled() => return Ok(()),
            page = self.bounded(cursor.next_page(&*self.store)) => page?,
        };

        let mut state = self.state();
        let current = self.generation.load(Ordering::SeqCst) == generation
            && !self.is_disposed()
            && state.cursor == snapshot;
        if current {
            state.posts.extend(page.posts);
            state.cursor = cursor;
        } else {
            debug!(scope = ?self.scope, "Discarding superseded page");
        }
        Ok(())
    }

    /// Flips the acting user's like on the post. Returns the new
    /// membership state.
    pub async fn toggle_like(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let user = self.current_user()?;

        let now_liked = {
            let mut state = self.state();
            let post = find_post(&mut state, post_id)?;
            post.toggle_like(user.id)
        };
        let op = if now_liked {
            MembershipOp::Add
        } else {
            MembershipOp::Remove
        };

        match self
            .remote(
                self.store
                    .update_membership(post_id, MembershipField::Likes, op, user.id),
            )
            .await
        {
            Ok(()) => Ok(now_liked),
            Err(error) => {
                let mut state = self.state();
                if let Ok(post) = find_post(&mut state, post_id) {
                    // Revert only the acting user's membership.
                    if now_liked {
                        post.liked_by.remove(&user.id);
                    } else {
                        post.liked_by.insert(user.id);
                    }
                }
                warn!(post = %post_id, error = %error, "Rolled back like toggle");
                Err(error)
            }
        }
    }

    /// Flips the acting user's save on the post. On the user's own
    /// saved-posts view, unsaving also removes the entry from the list;
    /// a failed write puts it back.
    pub async fn toggle_save(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let user = self.current_user()?;
        let removes_entry = matches!(self.scope, FeedScope::SavedBy(owner) if owner == user.id);

        let (now_saved, removed) = {
            let mut state = self.state();
            let position = state
                .posts
                .iter()
                .position(|post| post.id == post_id)
                .ok_or(SyncError::PostNotInView(post_id))?;
            let now_saved = state.posts[position].toggle_save(user.id);
            let removed = (!now_saved && removes_entry).then(|| state.posts.remove(position));
            (now_saved, removed)
        };
        let op = if now_saved {
            MembershipOp::Add
        } else {
            MembershipOp::Remove
        };

        match self
            .remote(
                self.store
                    .update_membership(post_id, MembershipField::Saves, op, user.id),
            )
            .await
        {
            Ok(()) => Ok(now_saved),
            Err(error) => {
                let mut state = self.state();
                if let Some(mut post) = removed {
                    post.saved_by.insert(user.id);
                    insert_sorted(&mut state.posts, post);
                } else if let Ok(post) = find_post(&mut state, post_id) {
                    if now_saved {
                        post.saved_by.remove(&user.id);
                    } else {
                        post.saved_by.insert(user.id);
                    }
                }
                warn!(post = %post_id, error = %error, "Rolled back save toggle");
                Err(error)
            }
        }
    }

    /// Appends a top-level comment. The comment id is minted locally and
    /// already authoritative when the append confirms.
    pub async fn add_comment(
        &self,
        post_id: Id<PostMarker>,
        text: &str,
    ) -> Result<Id<CommentMarker>> {
        let user = self.current_user()?;
        let text = CommentText::new(text).map_err(ModelValidationError::from)?;

        let comment_id: Id<CommentMarker> = self.mint.mint();
        let comment = Comment::new(
            comment_id,
            user.id,
            text,
            comment_id.snowflake().created_at(),
        );

        {
            let mut state = self.state();
            let post = find_post(&mut state, post_id)?;
            post.add_comment(comment.clone());
        }

        match self
            .remote(self.store.append_comment(post_id, (&comment).into()))
            .await
        {
            Ok(()) => Ok(comment_id),
            Err(error) => {
                let mut state = self.state();
                if let Ok(post) = find_post(&mut state, post_id) {
                    post.remove_comment(comment_id);
                }
                warn!(post = %post_id, error = %error, "Rolled back comment");
                Err(error)
            }
        }
    }

    /// Appends a reply to an existing comment.
    ///
    /// The write is a revision-checked swap of the whole comment list:
    /// the current tree is re-read immediately before each attempt, so a
    /// concurrent reply from another user is merged instead of lost.
    pub async fn add_reply(
        &self,
        post_id: Id<PostMarker>,
        parent_id: Id<CommentMarker>,
        text: &str,
    ) -> Result<Id<CommentMarker>> {
        let user = self.current_user()?;
        let text = CommentText::new(text).map_err(ModelValidationError::from)?;

        let reply_id: Id<CommentMarker> = self.mint.mint();
        let reply = Comment::new(reply_id, user.id, text, reply_id.snowflake().created_at());

        {
            let mut state = self.state();
            let post = find_post(&mut state, post_id)?;
            post.add_reply(parent_id, reply.clone())
                .map_err(|_| SyncError::CommentNotFound(parent_id))?;
        }

        for _attempt in 0..self.config.reply_retry_limit.max(1) {
            let stored = match self.remote(self.store.get(post_id)).await {
                Ok(Some(stored)) => stored,
                Ok(None) => return self.undo_reply(post_id, reply_id, SyncError::PostNotFound(post_id)),
                Err(error) => return self.undo_reply(post_id, reply_id, error),
            };

            let mut authoritative = match stored.document.into_post(post_id) {
                Ok(post) => post,
                Err(error) => return self.undo_reply(post_id, reply_id, error.into()),
            };
            if authoritative.add_reply(parent_id, reply.clone()).is_err() {
                return self.undo_reply(post_id, reply_id, SyncError::CommentNotFound(parent_id));
            }

            let comments = authoritative.comments.iter().map(Into::into).collect();
            let timeout = self.config.remote_timeout();
            let write =
                tokio::time::timeout(timeout, self.store.replace_comments(post_id, stored.revision, comments))
                    .await;
            match write {
                Err(_) => return self.undo_reply(post_id, reply_id, SyncError::Timeout(timeout)),
                Ok(Err(StoreError::RevisionConflict { .. })) => {
                    debug!(post = %post_id, "Reply write conflicted, re-reading");
                }
                Ok(Err(error)) => return self.undo_reply(post_id, reply_id, error.into()),
                Ok(Ok(())) => {
                    // Adopt the authoritative tree; it contains our reply
                    // plus anything that landed since the optimistic insert.
                    let mut state = self.state();
                    if let Ok(post) = find_post(&mut state, post_id) {
                        post.comments = authoritative.comments;
                    }
                    return Ok(reply_id);
                }
            }
        }

        self.undo_reply(post_id, reply_id, SyncError::Conflict)
    }

    /// Deletes the post. Only its author may; the entry comes back if the
    /// remote delete fails.
    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<()> {
        let user = self.current_user()?;

        let removed = {
            let mut state = self.state();
            let position = state
                .posts
                .iter()
                .position(|post| post.id == post_id)
                .ok_or(SyncError::PostNotInView(post_id))?;
            if state.posts[position].author_id != user.id {
                return Err(SyncError::NotAuthor);
            }
            state.posts.remove(position)
        };

        match self.remote(self.store.delete(post_id)).await {
            Ok(()) => Ok(()),
            // Someone else already deleted it; the outcome stands.
            Err(SyncError::PostNotFound(_)) => Ok(()),
            Err(error) => {
                let mut state = self.state();
                insert_sorted(&mut state.posts, removed);
                warn!(post = %post_id, error = %error, "Rolled back delete");
                Err(error)
            }
        }
    }

    /// Validates, writes and publishes a new post, then restarts this
    /// view from the first page -- the new post is always the most recent.
    pub async fn create_post(&self, new_post: NewPost) -> Result<Id<PostMarker>> {
        let user = self.current_user()?;
        let post_id: Id<PostMarker> = self.mint.mint();

        let timeout = self.config.remote_timeout();
        let written = tokio::time::timeout(timeout, async {
            let post =
                compose::build_post(new_post, user.id, post_id, self.blob_store.as_deref()).await?;
            let document = PostDocument::from(&post);
            self.store
                .insert(post_id, document)
                .await
                .map_err(SyncError::from)
        })
        .await;

        match written {
            Err(_) => Err(SyncError::Timeout(timeout)),
            Ok(Err(error)) => Err(error),
            Ok(Ok(())) => {
                self.refresh().await?;
                Ok(post_id)
            }
        }
    }

    fn current_user(&self) -> Result<User> {
        self.session.current_user().ok_or(SyncError::NotSignedIn)
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn undo_reply<T>(
        &self,
        post_id: Id<PostMarker>,
        reply_id: Id<CommentMarker>,
        error: SyncError,
    ) -> Result<T> {
        let mut state = self.state();
        if let Ok(post) = find_post(&mut state, post_id) {
            post.remove_comment(reply_id);
        }
        drop(state);
        warn!(post = %post_id, error = %error, "Rolled back reply");
        Err(error)
    }

    /// Bounds a store call by the configured remote timeout.
    async fn remote<T>(
        &self,
        operation: impl Future<Output = lichtbild_store::store::Result<T>>,
    ) -> Result<T> {
        let timeout = self.config.remote_timeout();
        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(SyncError::Timeout(timeout)),
        }
    }

    /// Same bound for futures that already speak [`SyncError`].
    async fn bounded<T>(&self, operation: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.config.remote_timeout();
        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(timeout)),
        }
    }
}

fn find_post(state: &mut ViewState, post_id: Id<PostMarker>) -> Result<&mut Post> {
    state
        .posts
        .iter_mut()
        .find(|post| post.id == post_id)
        .ok_or(SyncError::PostNotInView(post_id))
}

/// Reinserts a rolled-back entry at its ordered position.
fn insert_sorted(posts: &mut Vec<Post>, post: Post) {
    let key = post.page_key();
    let position = posts
        .iter()
        .position(|existing| existing.page_key() < key)
        .unwrap_or(posts.len());
    posts.insert(position, post);
}
