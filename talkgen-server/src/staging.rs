//! Per-request temporary files
//!
//! [`Stager::stage`] writes the uploaded image and audio into uniquely
//! named files and reserves an output path. [`StagedFiles`] owns all three
//! paths; they are removed by [`StagedFiles::release`] or, if the request
//! ends some other way, when the value is dropped.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::intake::{UploadPair, UploadedFile};

const FILE_PREFIX: &str = "talkgen";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif"];
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "flac", "ogg", "aac"];

/// Semantic role of a staged input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaRole {
    Image,
    Audio,
}

impl MediaRole {
    fn label(self) -> &'static str {
        match self {
            MediaRole::Image => "image",
            MediaRole::Audio => "audio",
        }
    }

    fn default_extension(self) -> &'static str {
        match self {
            MediaRole::Image => "jpg",
            MediaRole::Audio => "wav",
        }
    }

    fn accepts(self, extension: &str) -> bool {
        let known = match self {
            MediaRole::Image => IMAGE_EXTENSIONS,
            MediaRole::Audio => AUDIO_EXTENSIONS,
        };
        known.contains(&extension)
    }

    fn matches(self, matcher: infer::MatcherType) -> bool {
        matches!(
            (self, matcher),
            (MediaRole::Image, infer::MatcherType::Image) | (MediaRole::Audio, infer::MatcherType::Audio)
        )
    }
}

/// Pick a temp-file extension for an upload
///
/// Declared filename first, then the declared MIME type, then the type
/// detected from the bytes, then the role default. Only extensions known
/// for the role are used.
pub fn extension_for(upload: &UploadedFile, role: MediaRole) -> String {
    let declared = upload
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| role.accepts(ext));
    if let Some(ext) = declared {
        return ext;
    }

    let from_mime = upload
        .content_type
        .as_deref()
        .and_then(|mime| mime.split_once('/'))
        .filter(|(top, _)| top.eq_ignore_ascii_case(role.label()))
        .map(|(_, sub)| sub.trim().trim_start_matches("x-").to_ascii_lowercase())
        .filter(|ext| role.accepts(ext));
    if let Some(ext) = from_mime {
        return ext;
    }

    if let Some(kind) = infer::get(&upload.bytes) {
        if role.matches(kind.matcher_type()) && role.accepts(kind.extension()) {
            return kind.extension().to_string();
        }
    }

    role.default_extension().to_string()
}

/// Creates [`StagedFiles`] inside one directory
#[derive(Debug, Clone)]
pub struct Stager {
    dir: PathBuf,
}

impl Stager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write both uploads and reserve an output path
    ///
    /// Nothing is left behind on error.
    pub async fn stage(&self, uploads: &UploadPair) -> io::Result<StagedFiles> {
        let id = Uuid::new_v4();
        let image_path = self.input_path(id, &uploads.image, MediaRole::Image);
        let audio_path = self.input_path(id, &uploads.audio, MediaRole::Audio);
        let output_path = self.path_for(id, "output", "mp4");

        // Owned from here on, so an early return or a cancelled future
        // cleans up whatever was written.
        let mut staged = StagedFiles {
            image_path,
            audio_path,
            output_path,
            released: false,
        };

        if let Err(e) = write_new(&staged.image_path, &uploads.image.bytes).await {
            if e.kind() == io::ErrorKind::AlreadyExists {
                // Name belongs to someone else; touch nothing.
                staged.released = true;
            }
            return Err(e);
        }
        if let Err(e) = write_new(&staged.audio_path, &uploads.audio.bytes).await {
            if e.kind() == io::ErrorKind::AlreadyExists {
                staged.released = true;
                if let Err(rm) = fs::remove_file(&staged.image_path).await {
                    log_removal_failure(&staged.image_path, rm);
                }
            }
            return Err(e);
        }

        debug!(
            "Staged request {}: {}, {}",
            id,
            staged.image_path.display(),
            staged.audio_path.display()
        );
        Ok(staged)
    }

    fn input_path(&self, id: Uuid, upload: &UploadedFile, role: MediaRole) -> PathBuf {
        self.path_for(id, role.label(), &extension_for(upload, role))
    }

    fn path_for(&self, id: Uuid, role: &str, extension: &str) -> PathBuf {
        self.dir
            .join(format!("{}-{}-{}.{}", FILE_PREFIX, id, role, extension))
    }
}

async fn write_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

/// The three temp paths owned by one request
#[derive(Debug)]
pub struct StagedFiles {
    pub image_path: PathBuf,
    pub audio_path: PathBuf,
    /// Reserved for the backend; not created by staging
    pub output_path: PathBuf,
    released: bool,
}

impl StagedFiles {
    pub fn paths(&self) -> [&Path; 3] {
        [&self.image_path, &self.audio_path, &self.output_path]
    }

    /// Remove all three paths
    ///
    /// A failure on one path is logged and does not stop the others.
    pub async fn release(mut self) {
        self.released = true;
        for path in self.paths() {
            if let Err(e) = fs::remove_file(path).await {
                log_removal_failure(path, e);
            }
        }
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        for path in self.paths() {
            if let Err(e) = std::fs::remove_file(path) {
                log_removal_failure(path, e);
            }
        }
    }
}

fn log_removal_failure(path: &Path, err: io::Error) {
    if err.kind() != io::ErrorKind::NotFound {
        warn!("Failed to remove staged file {}: {}", path.display(), err);
    }
}
