//! Capability seams for the external backend.
//!
//! The remote document store is authoritative; these traits describe the
//! operations the sync core needs from it. Membership writes are atomic
//! set primitives and comment writes are either atomic appends or
//! revision-checked swaps, so concurrent writers never lose updates.

use crate::document::{CommentDocument, PostDocument, UserDocument};
use async_trait::async_trait;
use lichtbild_common::model::{
    Id,
    post::{PageKey, PostMarker},
    user::UserMarker,
};
use std::{
    fmt::{Display, Formatter},
    num::NonZeroU32,
};
use thiserror::Error;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum StoreError {
    #[error("Post with id {0} was not found")]
    PostNotFound(Id<PostMarker>),
    #[error("Comment revision did not match: expected {expected}, found {found}")]
    RevisionConflict { expected: Revision, found: Revision },
    #[error("The backend was unreachable: {0}")]
    Unavailable(String),
}

/// Per-document write counter. Every write bumps it; a
/// [`PostStore::replace_comments`] call names the revision it read.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Revision(u64);

impl Revision {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Which slice of the posts collection a view looks at.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum FeedScope {
    Global,
    Author(Id<UserMarker>),
    SavedBy(Id<UserMarker>),
}

impl FeedScope {
    #[must_use]
    pub fn admits(self, document: &PostDocument) -> bool {
        match self {
            FeedScope::Global => true,
            FeedScope::Author(author) => document.user_id == u64::from(author),
            FeedScope::SavedBy(user) => document.saves.contains(&u64::from(user)),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum MembershipField {
    Likes,
    Saves,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum MembershipOp {
    Add,
    Remove,
}

/// A document together with the key and revision the store holds for it.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct StoredPost {
    pub id: Id<PostMarker>,
    pub revision: Revision,
    pub document: PostDocument,
}

impl StoredPost {
    #[must_use]
    pub fn page_key(&self) -> PageKey {
        PageKey {
            created_at: self.document.created_at,
            id: self.id,
        }
    }
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Posts in `(created_at desc, id desc)` order, strictly after `after`,
    /// at most `limit` of them. `None` means no limit.
    async fn query_page(
        &self,
        scope: FeedScope,
        after: Option<PageKey>,
        limit: Option<NonZeroU32>,
    ) -> Result<Vec<StoredPost>>;

    async fn get(&self, id: Id<PostMarker>) -> Result<Option<StoredPost>>;

    async fn insert(&self, id: Id<PostMarker>, document: PostDocument) -> Result<()>;

    /// Atomic add/remove of one user on a membership set. Adding a present
    /// member or removing an absent one is a no-op.
    async fn update_membership(
        &self,
        id: Id<PostMarker>,
        field: MembershipField,
        op: MembershipOp,
        user: Id<UserMarker>,
    ) -> Result<()>;

    /// Atomic append of one top-level comment.
    async fn append_comment(&self, id: Id<PostMarker>, comment: CommentDocument) -> Result<()>;

    /// Replaces the whole comment list, but only if the document is still
    /// at `expected`. Fails with [`StoreError::RevisionConflict`] otherwise.
    async fn replace_comments(
        &self,
        id: Id<PostMarker>,
        expected: Revision,
        comments: Vec<CommentDocument>,
    ) -> Result<()>;

    async fn delete(&self, id: Id<PostMarker>) -> Result<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: Id<UserMarker>) -> Result<Option<UserDocument>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDocument>>;

    async fn put_user(&self, document: UserDocument) -> Result<()>;
}

/// Binary hosting for images too large to inline into a document.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads the bytes and returns the url they are served under.
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String>;
}
