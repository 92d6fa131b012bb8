//! Generation dispatcher
//!
//! Decides per request between the real backend and the placeholder video.
//! The backend path makes exactly one bounded attempt; there are no retries.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::backend::{InferenceBackend, InferenceError};
use crate::readiness::ReadinessState;
use crate::staging::StagedFiles;

pub const VIDEO_MP4: &str = "video/mp4";

/// Where an artifact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource {
    Backend,
    Placeholder,
}

impl ArtifactSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactSource::Backend => "backend",
            ArtifactSource::Placeholder => "placeholder",
        }
    }
}

/// Video returned to the client
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub bytes: Bytes,
    pub content_type: &'static str,
    pub source: ArtifactSource,
}

/// Backend path failures (HTTP 500)
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("inference backend failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference backend produced no output file")]
    MissingOutput,

    #[error("failed to read generated video: {0}")]
    ReadOutput(#[source] std::io::Error),
}

impl DispatchError {
    /// Client-safe summary; no paths or backend output
    pub fn public_details(&self) -> String {
        match self {
            DispatchError::Inference(_) => "inference backend reported an error".to_string(),
            DispatchError::Timeout(limit) => {
                format!("inference timed out after {} seconds", limit.as_secs())
            }
            DispatchError::MissingOutput => "inference backend produced no video".to_string(),
            DispatchError::ReadOutput(_) => "generated video could not be read".to_string(),
        }
    }
}

/// Runs the backend or substitutes the placeholder
pub struct GenerationDispatcher {
    readiness: Arc<ReadinessState>,
    backend: Option<Arc<dyn InferenceBackend>>,
    placeholder: Bytes,
    timeout: Duration,
}

impl GenerationDispatcher {
    pub fn new(
        readiness: Arc<ReadinessState>,
        backend: Option<Arc<dyn InferenceBackend>>,
        placeholder: Bytes,
        timeout: Duration,
    ) -> Self {
        Self {
            readiness,
            backend,
            placeholder,
            timeout,
        }
    }

    /// Produce the artifact for one staged request
    pub async fn dispatch(&self, staged: &StagedFiles) -> Result<GeneratedArtifact, DispatchError> {
        let backend = match (&self.backend, self.readiness.backend_ready) {
            (Some(backend), true) => backend,
            (None, _) => {
                warn!("No inference backend configured; returning placeholder video");
                return Ok(self.placeholder_artifact());
            }
            (Some(_), false) => {
                warn!(
                    "Backend not ready ({}); returning placeholder video",
                    self.readiness.reasons.join("; ")
                );
                return Ok(self.placeholder_artifact());
            }
        };

        info!("Running inference with {}", backend.name());
        let run = backend.run(&staged.image_path, &staged.audio_path, &staged.output_path);
        let outcome = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(())) => self.read_output(staged).await,
            Ok(Err(e)) => Err(DispatchError::Inference(e)),
            Err(_) => Err(DispatchError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(bytes) => {
                info!("Generated video: {} bytes", bytes.len());
                Ok(GeneratedArtifact {
                    bytes,
                    content_type: VIDEO_MP4,
                    source: ArtifactSource::Backend,
                })
            }
            Err(e) => {
                error!("Video generation failed: {:?}", e);
                Err(e)
            }
        }
    }

    async fn read_output(&self, staged: &StagedFiles) -> Result<Bytes, DispatchError> {
        match tokio::fs::read(&staged.output_path).await {
            Ok(bytes) if bytes.is_empty() => Err(DispatchError::MissingOutput),
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DispatchError::MissingOutput),
            Err(e) => Err(DispatchError::ReadOutput(e)),
        }
    }

    fn placeholder_artifact(&self) -> GeneratedArtifact {
        GeneratedArtifact {
            bytes: self.placeholder.clone(),
            content_type: VIDEO_MP4,
            source: ArtifactSource::Placeholder,
        }
    }
}
