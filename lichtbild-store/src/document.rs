//! Raw persisted document shapes.
//!
//! Documents arrive from an external store and are untrusted: conversion
//! into model types validates everything that carries an invariant, and a
//! malformed legacy document surfaces as a [`ModelValidationError`] instead
//! of a crash.

use lichtbild_common::model::{
    Id, ModelValidationError,
    comment::{Comment, CommentText},
    image::ImageSource,
    post::{Post, PostMarker},
    user::{DisplayName, EmailAddress, User},
};
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDocument {
    pub user_id: u64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub caption: String,
    pub created_at: UtcDateTime,
    #[serde(default)]
    pub likes: Vec<u64>,
    #[serde(default)]
    pub comments: Vec<CommentDocument>,
    #[serde(default)]
    pub saves: Vec<u64>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDocument {
    pub id: u64,
    pub user_id: u64,
    pub text: String,
    pub created_at: UtcDateTime,
    #[serde(default)]
    pub replies: Vec<CommentDocument>,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    pub uid: u64,
    pub email: String,
    pub display_name: String,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    pub created_at: UtcDateTime,
}

impl PostDocument {
    /// The post id is not part of the document body; the store keys on it.
    pub fn into_post(self, id: impl Into<Id<PostMarker>>) -> Result<Post, ModelValidationError> {
        let image = match (self.image_url, self.image_base64) {
            (Some(url), _) => Some(ImageSource::Url(url)),
            (None, Some(base64)) => Some(ImageSource::Inline(base64.into())),
            (None, None) => None,
        };

        let caption = {
            let trimmed = self.caption.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        };

        Ok(Post {
            id: id.into(),
            author_id: self.user_id.into(),
            image,
            caption,
            created_at: self.created_at,
            liked_by: self.likes.into_iter().map(Into::into).collect(),
            saved_by: self.saves.into_iter().map(Into::into).collect(),
            comments: self
                .comments
                .into_iter()
                .map(Comment::try_from)
                .collect::<Result<_, _>>()?,
            file_name: self.file_name,
            file_type: self.file_type,
        })
    }
}

impl From<&Post> for PostDocument {
    fn from(post: &Post) -> Self {
        let (image_url, image_base64) = match &post.image {
            Some(ImageSource::Url(url)) => (Some(url.clone()), None),
            Some(ImageSource::Inline(inline)) => (None, Some(inline.data_url().to_owned())),
            None => (None, None),
        };

        Self {
            user_id: post.author_id.into(),
            image_url,
            image_base64,
            caption: post.caption.clone().unwrap_or_default(),
            created_at: post.created_at,
            likes: post.liked_by.iter().copied().map(Into::into).collect(),
            comments: post.comments.iter().map(Into::into).collect(),
            saves: post.saved_by.iter().copied().map(Into::into).collect(),
            file_name: post.file_name.clone(),
            file_type: post.file_type.clone(),
        }
    }
}

impl TryFrom<CommentDocument> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            author_id: value.user_id.into(),
            text: CommentText::new(&value.text)?,
            created_at: value.created_at,
            replies: value
                .replies
                .into_iter()
                .map(Comment::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl From<&Comment> for CommentDocument {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id.into(),
            user_id: comment.author_id.into(),
            text: comment.text.get().to_owned(),
            created_at: comment.created_at,
            replies: comment.replies.iter().map(Into::into).collect(),
        }
    }
}

impl TryFrom<UserDocument> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.uid.into(),
            email: EmailAddress::new(value.email)?,
            display_name: DisplayName::new(value.display_name)?,
            avatar_url: value.photo_url,
        })
    }
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        Self {
            uid: user.id.into(),
            email: user.email.get().to_owned(),
            display_name: user.display_name.get().to_owned(),
            photo_url: user.avatar_url.clone(),
            bio: None,
            created_at: UtcDateTime::now(),
        }
    }
}
