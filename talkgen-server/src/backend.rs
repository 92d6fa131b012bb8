//! Inference backend seam
//!
//! The video synthesis itself lives outside this service. A backend takes
//! the staged image and audio paths and must leave an MP4 at the output
//! path, or fail.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use talkgen_common::config::BackendConfig;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Longest stderr tail kept in an [`InferenceError::Failed`]
const STDERR_TAIL_CHARS: usize = 2000;

/// Failure reported by an inference backend
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("failed to start inference process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("inference process exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("inference failed: {0}")]
    Other(String),
}

/// External video-synthesis capability
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Produce a video at `output` from `image` and `audio`
    async fn run(&self, image: &Path, audio: &Path, output: &Path) -> Result<(), InferenceError>;
}

/// Runs an external program per request
///
/// Argument tokens `{image}`, `{audio}` and `{output}` are replaced with
/// the staged paths. The child is killed if the call is abandoned.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
        }
    }

    /// Argument list with staged paths substituted
    pub fn render_args(&self, image: &Path, audio: &Path, output: &Path) -> Vec<String> {
        let image = image.to_string_lossy();
        let audio = audio.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{image}", &image)
                    .replace("{audio}", &audio)
                    .replace("{output}", &output)
            })
            .collect()
    }
}

#[async_trait]
impl InferenceBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.program
    }

    async fn run(&self, image: &Path, audio: &Path, output: &Path) -> Result<(), InferenceError> {
        let args = self.render_args(image, audio, output);
        debug!("Running {} {:?}", self.program, args);

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let result = command.output().await.map_err(InferenceError::Spawn)?;
        if !result.status.success() {
            return Err(InferenceError::Failed {
                status: result.status,
                stderr: stderr_tail(&result.stderr),
            });
        }

        info!("Inference process {} finished", self.program);
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - STDERR_TAIL_CHARS).collect()
}
