//! Post composition: validating input and assembling the aggregate that a
//! create operation writes.

use crate::error::{Result, SyncError};
use lichtbild_common::model::{
    Id, ModelValidationError,
    image::{ImageSource, ImageUpload, ImageValidationError, MAX_INLINE_IMAGE_BYTES},
    post::{Post, PostMarker},
    user::UserMarker,
};
use lichtbild_store::store::BlobStore;
use std::collections::BTreeSet;

/// What a caller hands over to create a post. At least one of image and
/// caption must survive validation.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct NewPost {
    pub image: Option<ImageUpload>,
    pub caption: Option<String>,
}

/// Builds the full aggregate for a freshly minted id. Small images are
/// inlined into the document; larger ones go through the blob store when
/// one is configured and are rejected otherwise.
pub(crate) async fn build_post(
    new_post: NewPost,
    author_id: Id<UserMarker>,
    id: Id<PostMarker>,
    blob_store: Option<&dyn BlobStore>,
) -> Result<Post> {
    let caption = new_post
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|caption| !caption.is_empty())
        .map(ToOwned::to_owned);

    if new_post.image.is_none() && caption.is_none() {
        return Err(SyncError::NothingToPost);
    }

    let (image, file_name, file_type) = match new_post.image {
        None => (None, None, None),
        Some(upload) => {
            upload.validate().map_err(ModelValidationError::from)?;

            let source = if upload.bytes.len() <= MAX_INLINE_IMAGE_BYTES {
                ImageSource::Inline(upload.encode_inline().map_err(ModelValidationError::from)?)
            } else if let Some(blobs) = blob_store {
                let path = format!("posts/{id}/{name}", name = upload.file_name);
                ImageSource::Url(blobs.upload(&path, &upload.bytes).await?)
            } else {
                return Err(ModelValidationError::from(
                    ImageValidationError::TooLargeForInline(upload.bytes.len()),
                )
                .into());
            };

            (Some(source), Some(upload.file_name), Some(upload.content_type))
        }
    };

    Ok(Post {
        id,
        author_id,
        image,
        caption,
        created_at: id.snowflake().created_at(),
        liked_by: BTreeSet::new(),
        saved_by: BTreeSet::new(),
        comments: Vec::new(),
        file_name,
        file_type,
    })
}
