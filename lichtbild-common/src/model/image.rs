use base64::{Engine, prelude::BASE64_STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest original an image may be for inline document storage.
pub const MAX_INLINE_IMAGE_BYTES: usize = 1024 * 1024;
/// Hard cap on the encoded data-url length written into a document.
pub const MAX_ENCODED_IMAGE_LEN: usize = 10_000_000;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum ImageValidationError {
    #[error("The image file is empty")]
    Empty,
    #[error("Only image files are allowed, got {0}")]
    NotAnImage(String),
    #[error("Image of {0} bytes exceeds the inline storage limit")]
    TooLargeForInline(usize),
    #[error("Encoded image of {0} characters exceeds the document limit")]
    EncodedTooLarge(usize),
}

/// An image file as handed over by the caller, not yet validated.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

impl ImageUpload {
    pub fn validate(&self) -> Result<(), ImageValidationError> {
        if self.bytes.is_empty() {
            return Err(ImageValidationError::Empty);
        }
        if !self.content_type.starts_with("image/") {
            return Err(ImageValidationError::NotAnImage(self.content_type.clone()));
        }
        Ok(())
    }

    /// Encodes the image as a `data:` url for inline document storage.
    pub fn encode_inline(&self) -> Result<InlineImage, ImageValidationError> {
        self.validate()?;
        if self.bytes.len() > MAX_INLINE_IMAGE_BYTES {
            return Err(ImageValidationError::TooLargeForInline(self.bytes.len()));
        }

        let data_url = format!(
            "data:{};base64,{}",
            self.content_type,
            BASE64_STANDARD.encode(&self.bytes)
        );
        if data_url.len() > MAX_ENCODED_IMAGE_LEN {
            return Err(ImageValidationError::EncodedTooLarge(data_url.len()));
        }

        Ok(InlineImage(data_url))
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InlineImage(String);

impl InlineImage {
    #[must_use]
    pub fn data_url(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for InlineImage {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Where a post's image lives: hosted behind a url, or inline in the
/// document itself.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub enum ImageSource {
    Url(String),
    Inline(InlineImage),
}

#[cfg(test)]
mod tests {
    use crate::model::image::{
        ImageUpload, ImageValidationError, MAX_INLINE_IMAGE_BYTES,
    };

    fn upload(bytes: Vec<u8>, content_type: &str) -> ImageUpload {
        ImageUpload {
            bytes,
            file_name: "photo.png".to_owned(),
            content_type: content_type.to_owned(),
        }
    }

    #[test]
    fn rejects_non_images() {
        assert_eq!(
            upload(vec![1, 2, 3], "text/plain").encode_inline(),
            Err(ImageValidationError::NotAnImage("text/plain".to_owned()))
        );
    }

    #[test]
    fn rejects_empty_files() {
        assert_eq!(
            upload(Vec::new(), "image/png").encode_inline(),
            Err(ImageValidationError::Empty)
        );
    }

    #[test]
    fn rejects_oversized_originals() {
        let oversized = vec![0u8; MAX_INLINE_IMAGE_BYTES + 1];
        assert_eq!(
            upload(oversized, "image/png").encode_inline(),
            Err(ImageValidationError::TooLargeForInline(
                MAX_INLINE_IMAGE_BYTES + 1
            ))
        );
    }

    #[test]
    fn encodes_as_data_url() {
        let inline = upload(vec![1, 2, 3], "image/png").encode_inline().unwrap();
        assert!(inline.data_url().starts_with("data:image/png;base64,"));
    }
}
