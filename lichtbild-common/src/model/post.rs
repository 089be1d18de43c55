use crate::model::{
    Id,
    comment::{Comment, CommentMarker},
    image::ImageSource,
    user::UserMarker,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// The post aggregate: one consistency unit of image, caption, like set,
/// save set and comment tree.
///
/// `id`, `author_id` and `created_at` never change after creation.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub image: Option<ImageSource>,
    pub caption: Option<String>,
    pub created_at: UtcDateTime,
    pub liked_by: BTreeSet<Id<UserMarker>>,
    pub saved_by: BTreeSet<Id<UserMarker>>,
    pub comments: Vec<Comment>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
}

/// Sort and pagination key: `created_at` first, `id` breaking ties, so any
/// two posts are strictly ordered.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageKey {
    pub created_at: UtcDateTime,
    pub id: Id<PostMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The parent comment was not found on the post")]
pub struct ReplyTargetMissingError;

impl Post {
    #[must_use]
    pub fn page_key(&self) -> PageKey {
        PageKey {
            created_at: self.created_at,
            id: self.id,
        }
    }

    #[must_use]
    pub fn is_liked_by(&self, user: Id<UserMarker>) -> bool {
        self.liked_by.contains(&user)
    }

    #[must_use]
    pub fn is_saved_by(&self, user: Id<UserMarker>) -> bool {
        self.saved_by.contains(&user)
    }

    /// Flips the user's like membership and returns the new state.
    /// Flipping twice restores the original set.
    pub fn toggle_like(&mut self, user: Id<UserMarker>) -> bool {
        if self.liked_by.remove(&user) {
            false
        } else {
            self.liked_by.insert(user);
            true
        }
    }

    /// Same contract as [`Self::toggle_like`], independent set.
    pub fn toggle_save(&mut self, user: Id<UserMarker>) -> bool {
        if self.saved_by.remove(&user) {
            false
        } else {
            self.saved_by.insert(user);
            true
        }
    }

    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    /// Appends a reply to the comment with the given id, wherever it sits
    /// in the tree. Sibling replies already present are preserved.
    pub fn add_reply(
        &mut self,
        parent_id: Id<CommentMarker>,
        reply: Comment,
    ) -> Result<(), ReplyTargetMissingError> {
        let parent = Comment::find_in_mut(&mut self.comments, parent_id)
            .ok_or(ReplyTargetMissingError)?;
        parent.replies.push(reply);
        Ok(())
    }

    pub fn remove_comment(&mut self, id: Id<CommentMarker>) -> Option<Comment> {
        Comment::remove_from(&mut self.comments, id)
    }
}
