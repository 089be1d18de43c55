use lichtbild_common::model::{Id, ModelValidationError, comment::CommentMarker, post::PostMarker};
use lichtbild_store::store::StoreError;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SyncError {
    #[error("No user is signed in")]
    NotSignedIn,
    #[error("Only the author may delete a post")]
    NotAuthor,
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    #[error("A post needs an image or a caption")]
    NothingToPost,
    #[error("Post with id {0} is not part of this view")]
    PostNotInView(Id<PostMarker>),
    #[error("Post with id {0} was not found")]
    PostNotFound(Id<PostMarker>),
    #[error("Comment with id {0} was not found")]
    CommentNotFound(Id<CommentMarker>),
    #[error("The page sequence is exhausted")]
    Exhausted,
    #[error("The backend was unreachable: {0}")]
    Network(String),
    #[error("The remote call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Concurrent updates kept conflicting")]
    Conflict,
}

/// Coarse classification, used to route an error to the right surface:
/// inline message, transient notification, or silent empty state.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ErrorKind {
    Auth,
    Validation,
    NotFound,
    Network,
    Exhausted,
    Conflict,
}

impl SyncError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::NotSignedIn | SyncError::NotAuthor => ErrorKind::Auth,
            SyncError::Validation(_) | SyncError::NothingToPost => ErrorKind::Validation,
            SyncError::PostNotInView(_)
            | SyncError::PostNotFound(_)
            | SyncError::CommentNotFound(_) => ErrorKind::NotFound,
            SyncError::Network(_) | SyncError::Timeout(_) => ErrorKind::Network,
            SyncError::Exhausted => ErrorKind::Exhausted,
            SyncError::Conflict => ErrorKind::Conflict,
        }
    }

    /// Whether re-running the same action can reasonably succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::Conflict
        )
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::PostNotFound(id) => SyncError::PostNotFound(id),
            StoreError::RevisionConflict { .. } => SyncError::Conflict,
            StoreError::Unavailable(message) => SyncError::Network(message),
        }
    }
}
