//! Lazy, restartable pagination over the posts collection.
//!
//! The cursor keys strictly on the `(created_at, id)` of the last returned
//! document, never on an offset, so a page chain returns every post that
//! existed at the time of the first page exactly once, even when writes
//! land between fetches.

use crate::error::{Result, SyncError};
use lichtbild_common::model::post::{PageKey, Post};
use lichtbild_store::store::{FeedScope, PostStore, StoredPost};
use std::num::NonZeroU32;
use tracing::warn;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub has_more: bool,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FeedCursor {
    scope: FeedScope,
    page_size: Option<NonZeroU32>,
    last_seen: Option<PageKey>,
    exhausted: bool,
}

impl FeedCursor {
    #[must_use]
    pub fn new(scope: FeedScope, page_size: Option<NonZeroU32>) -> Self {
        Self {
            scope,
            page_size,
            last_seen: None,
            exhausted: false,
        }
    }

    #[must_use]
    pub fn scope(&self) -> FeedScope {
        self.scope
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        !self.exhausted
    }

    /// Restarts the chain from the newest post.
    pub async fn first_page<S: PostStore>(&mut self, store: &S) -> Result<FeedPage> {
        self.last_seen = None;
        self.exhausted = false;
        self.fetch(store).await
    }

    /// The page after the last one returned; fails once the chain reported
    /// `has_more = false`.
    pub async fn next_page<S: PostStore>(&mut self, store: &S) -> Result<FeedPage> {
        if self.exhausted {
            return Err(SyncError::Exhausted);
        }
        self.fetch(store).await
    }

    async fn fetch<S: PostStore>(&mut self, store: &S) -> Result<FeedPage> {
        let stored = store
            .query_page(self.scope, self.last_seen, self.page_size)
            .await?;

        // The raw tail advances the cursor even if its document turns out
        // malformed, so a bad legacy document can never stall the chain.
        if let Some(last) = stored.last() {
            self.last_seen = Some(last.page_key());
        }
        self.exhausted = match self.page_size {
            Some(page_size) => stored.len() < page_size.get() as usize,
            None => true,
        };

        let posts = stored.into_iter().filter_map(Self::decode).collect();

        Ok(FeedPage {
            posts,
            has_more: !self.exhausted,
        })
    }

    fn decode(stored: StoredPost) -> Option<Post> {
        match stored.document.into_post(stored.id) {
            Ok(post) => Some(post),
            Err(error) => {
                warn!(post = %stored.id, error = %error, "Skipping malformed post document");
                None
            }
        }
    }
}
