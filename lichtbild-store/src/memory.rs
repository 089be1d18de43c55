//! In-memory reference backend.
//!
//! Single-process stand-in for the hosted document store, with the same
//! atomicity guarantees: membership updates are set-semantic, comment
//! appends are atomic, comment swaps are revision-checked.

use crate::{
    document::{CommentDocument, PostDocument, UserDocument},
    store::{
        BlobStore, FeedScope, MembershipField, MembershipOp, PostStore, Result, Revision,
        StoreError, StoredPost, UserStore,
    },
};
use async_trait::async_trait;
use lichtbild_common::model::{
    Id,
    post::{PageKey, PostMarker},
    user::UserMarker,
};
use std::{collections::HashMap, num::NonZeroU32};
use tokio::sync::RwLock;

#[derive(Clone, Eq, PartialEq, Debug)]
struct StoredEntry {
    document: PostDocument,
    revision: Revision,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    posts: RwLock<HashMap<Id<PostMarker>, StoredEntry>>,
    users: RwLock<HashMap<Id<UserMarker>, UserDocument>>,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored posts, for test assertions.
    pub async fn post_count(&self) -> usize {
        self.posts.read().await.len()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn query_page(
        &self,
        scope: FeedScope,
        after: Option<PageKey>,
        limit: Option<NonZeroU32>,
    ) -> Result<Vec<StoredPost>> {
        let posts = self.posts.read().await;

        let mut matching: Vec<StoredPost> = posts
            .iter()
            .filter(|(_, entry)| scope.admits(&entry.document))
            .map(|(id, entry)| StoredPost {
                id: *id,
                revision: entry.revision,
                document: entry.document.clone(),
            })
            .collect();

        matching.sort_by(|a, b| b.page_key().cmp(&a.page_key()));

        let page = matching
            .into_iter()
            .filter(|stored| after.is_none_or(|after| stored.page_key() < after))
            .take(limit.map_or(usize::MAX, |limit| limit.get() as usize))
            .collect();

        Ok(page)
    }

    async fn get(&self, id: Id<PostMarker>) -> Result<Option<StoredPost>> {
        let posts = self.posts.read().await;

        Ok(posts.get(&id).map(|entry| StoredPost {
            id,
            revision: entry.revision,
            document: entry.document.clone(),
        }))
    }

    async fn insert(&self, id: Id<PostMarker>, document: PostDocument) -> Result<()> {
        let mut posts = self.posts.write().await;

        posts.insert(
            id,
            StoredEntry {
                document,
                revision: Revision::default(),
            },
        );
        Ok(())
    }

    async fn update_membership(
        &self,
        id: Id<PostMarker>,
        field: MembershipField,
        op: MembershipOp,
        user: Id<UserMarker>,
    ) -> Result<()> {
        let mut posts = self.posts.write().await;
        let entry = posts.get_mut(&id).ok_or(StoreError::PostNotFound(id))?;

        let members = match field {
            MembershipField::Likes => &mut entry.document.likes,
            MembershipField::Saves => &mut entry.document.saves,
        };
        let user = u64::from(user);

        match op {
            MembershipOp::Add => {
                if !members.contains(&user) {
                    members.push(user);
                }
            }
            MembershipOp::Remove => members.retain(|member| *member != user),
        }

        entry.revision = entry.revision.next();
        Ok(())
    }

    async fn append_comment(&self, id: Id<PostMarker>, comment: CommentDocument) -> Result<()> {
        let mut posts = self.posts.write().await;
        let entry = posts.get_mut(&id).ok_or(StoreError::PostNotFound(id))?;

        entry.document.comments.push(comment);
        entry.revision = entry.revision.next();
        Ok(())
    }

    async fn replace_comments(
        &self,
        id: Id<PostMarker>,
        expected: Revision,
        comments: Vec<CommentDocument>,
    ) -> Result<()> {
        let mut posts = self.posts.write().await;
        let entry = posts.get_mut(&id).ok_or(StoreError::PostNotFound(id))?;

        if entry.revision != expected {
            return Err(StoreError::RevisionConflict {
                expected,
                found: entry.revision,
            });
        }

        entry.document.comments = comments;
        entry.revision = entry.revision.next();
        Ok(())
    }

    async fn delete(&self, id: Id<PostMarker>) -> Result<()> {
        let mut posts = self.posts.write().await;

        posts
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::PostNotFound(id))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, id: Id<UserMarker>) -> Result<Option<UserDocument>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDocument>> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn put_user(&self, document: UserDocument) -> Result<()> {
        let mut users = self.users.write().await;
        users.insert(document.uid.into(), document);
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<String> {
        let mut blobs = self.blobs.write().await;
        blobs.insert(path.to_owned(), bytes.to_vec());
        Ok(format!("memory://{path}"))
    }
}
