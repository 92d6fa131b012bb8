//! Upload intake for `POST /generate`
//!
//! Pulls the `image` and `audio` parts out of a multipart body. Parts are
//! buffered in full, so nothing is staged on disk until both are present.

use axum::extract::Multipart;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info};

pub const IMAGE_FIELD: &str = "image";
pub const AUDIO_FIELD: &str = "audio";

/// Client-caused upload problems (always HTTP 400)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No {0} file provided")]
    MissingField(&'static str),

    #[error("Empty {0} file provided")]
    EmptyField(&'static str),

    #[error("Invalid multipart request: {0}")]
    Malformed(String),
}

/// One uploaded part
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: None,
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Validated image + audio inputs for one generation request
#[derive(Debug, Clone)]
pub struct UploadPair {
    pub image: UploadedFile,
    pub audio: UploadedFile,
}

impl UploadPair {
    /// Check presence and non-emptiness; image is checked first
    pub fn from_parts(
        image: Option<UploadedFile>,
        audio: Option<UploadedFile>,
    ) -> Result<Self, ValidationError> {
        let image = require(image, IMAGE_FIELD)?;
        let audio = require(audio, AUDIO_FIELD)?;
        Ok(Self { image, audio })
    }
}

fn require(part: Option<UploadedFile>, field: &'static str) -> Result<UploadedFile, ValidationError> {
    match part {
        None => Err(ValidationError::MissingField(field)),
        Some(file) if file.is_empty() => Err(ValidationError::EmptyField(field)),
        Some(file) => Ok(file),
    }
}

/// Read every part of the request and keep `image` and `audio`
///
/// Unknown parts are drained and ignored. When a field repeats, the last
/// occurrence wins.
pub async fn extract_upload_pair(mut multipart: Multipart) -> Result<UploadPair, ValidationError> {
    let mut image = None;
    let mut audio = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ValidationError::Malformed(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ValidationError::Malformed(e.body_text()))?;

        let upload = UploadedFile {
            file_name,
            content_type,
            bytes,
        };

        match name.as_str() {
            IMAGE_FIELD => {
                info!(
                    "Received image: {} bytes ({})",
                    upload.len(),
                    upload.file_name.as_deref().unwrap_or("unnamed")
                );
                image = Some(upload);
            }
            AUDIO_FIELD => {
                info!(
                    "Received audio: {} bytes ({})",
                    upload.len(),
                    upload.file_name.as_deref().unwrap_or("unnamed")
                );
                audio = Some(upload);
            }
            other => debug!("Ignoring multipart field '{}' ({} bytes)", other, upload.len()),
        }
    }

    UploadPair::from_parts(image, audio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_image_reported_first() {
        let err = UploadPair::from_parts(None, None).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("image"));
        assert_eq!(err.to_string(), "No image file provided");
    }

    #[test]
    fn test_missing_audio() {
        let err = UploadPair::from_parts(Some(UploadedFile::new(&b"jpeg"[..])), None).unwrap_err();
        assert_eq!(err.to_string(), "No audio file provided");
    }

    #[test]
    fn test_empty_part_rejected() {
        let err = UploadPair::from_parts(
            Some(UploadedFile::new(&b"jpeg"[..])),
            Some(UploadedFile::new(Bytes::new())),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::EmptyField("audio"));
        assert_eq!(err.to_string(), "Empty audio file provided");
    }

    #[test]
    fn test_valid_pair() {
        let pair = UploadPair::from_parts(
            Some(UploadedFile::new(&b"jpeg"[..]).with_file_name("face.jpg")),
            Some(UploadedFile::new(&b"riff"[..]).with_file_name("voice.wav")),
        )
        .unwrap();
        assert_eq!(pair.image.file_name.as_deref(), Some("face.jpg"));
        assert_eq!(pair.audio.len(), 4);
    }
}
