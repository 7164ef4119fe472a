//! Photo capture collaborator.

use async_trait::async_trait;

use crate::error::CaptureError;

/// A captured photograph.
#[derive(Clone, PartialEq, Eq)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Photo {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: "image/jpeg".to_string(),
        }
    }

    /// Guess the content type from a file extension, defaulting to JPEG.
    pub fn from_file_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Self {
        let content_type = match extension.map(str::to_ascii_lowercase).as_deref() {
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("heic") => "image/heic",
            _ => "image/jpeg",
        };
        Self {
            bytes,
            content_type: content_type.to_string(),
        }
    }
}

impl std::fmt::Debug for Photo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Photo")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Takes a photograph of the customer.
#[async_trait]
pub trait PhotoCapture: Send + Sync {
    /// `Ok(None)` means the user dismissed the camera without a photo.
    async fn take_photo(&self) -> Result<Option<Photo>, CaptureError>;
}
