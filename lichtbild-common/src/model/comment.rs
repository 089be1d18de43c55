use crate::model::{Id, user::UserMarker};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

/// A comment is immutable once posted, except for appends to `replies`.
///
/// The shape is recursive; the views only ever insert one level deep.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub author_id: Id<UserMarker>,
    pub text: CommentText,
    pub created_at: UtcDateTime,
    pub replies: Vec<Comment>,
}

impl Comment {
    #[must_use]
    pub fn new(
        id: Id<CommentMarker>,
        author_id: Id<UserMarker>,
        text: CommentText,
        created_at: UtcDateTime,
    ) -> Self {
        Self {
            id,
            author_id,
            text,
            created_at,
            replies: Vec::new(),
        }
    }

    /// Depth-first search by id over a comment forest.
    #[must_use]
    pub fn find_in(comments: &[Comment], id: Id<CommentMarker>) -> Option<&Comment> {
        for comment in comments {
            if comment.id == id {
                return Some(comment);
            }
            if let Some(found) = Self::find_in(&comment.replies, id) {
                return Some(found);
            }
        }
        None
    }

    #[must_use]
    pub fn find_in_mut(comments: &mut [Comment], id: Id<CommentMarker>) -> Option<&mut Comment> {
        for comment in comments {
            if comment.id == id {
                return Some(comment);
            }
            if let Some(found) = Self::find_in_mut(&mut comment.replies, id) {
                return Some(found);
            }
        }
        None
    }

    /// Removes the comment with the given id from the forest, wherever it
    /// sits, returning it. Used to undo an optimistic insertion.
    pub fn remove_from(comments: &mut Vec<Comment>, id: Id<CommentMarker>) -> Option<Comment> {
        if let Some(position) = comments.iter().position(|comment| comment.id == id) {
            return Some(comments.remove(position));
        }
        for comment in comments {
            if let Some(removed) = Self::remove_from(&mut comment.replies, id) {
                return Some(removed);
            }
        }
        None
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct CommentText(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The comment text is empty")]
pub struct EmptyCommentTextError;

impl CommentText {
    pub fn new(text: &str) -> Result<Self, EmptyCommentTextError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Err(EmptyCommentTextError)
        } else {
            Ok(CommentText(trimmed.to_owned()))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for CommentText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        CommentText::new(&inner)
            .map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"CommentText"))
    }
}
