//! Bootstrap configuration and config file resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! Items 1 and 2 are applied by the binary on top of the [`TomlConfig`]
//! returned here; this module only owns items 3 and 4.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TALKGEN_CONFIG";

/// Bootstrap configuration loaded from TOML file
///
/// Every field has a built-in default, so an empty file (or no file at all)
/// is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Interface to bind the HTTP server to
    pub bind_address: String,

    /// HTTP server port
    pub port: u16,

    /// Directory holding the inference backend's model assets
    pub model_path: PathBuf,

    /// The backend counts as ready only with MORE than this many entries
    /// in `model_path`
    pub readiness_threshold: usize,

    /// Directory for per-request staged files (OS temp dir if unset)
    pub staging_dir: Option<PathBuf>,

    /// Upper bound on a single inference invocation
    pub inference_timeout_secs: u64,

    /// Maximum accepted request body size
    pub max_upload_bytes: usize,

    /// Replacement for the built-in placeholder video
    pub placeholder_path: Option<PathBuf>,

    /// External inference command (no backend when absent)
    pub backend: Option<BackendConfig>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// External inference command
///
/// `args` may contain the tokens `{image}`, `{audio}` and `{output}`,
/// which are replaced with the staged file paths for each request.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            model_path: PathBuf::from("./checkpoints"),
            readiness_threshold: 5,
            staging_dir: None,
            inference_timeout_secs: 600,
            max_upload_bytes: 50 * 1024 * 1024,
            placeholder_path: None,
            backend: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration, falling back to defaults when no file exists
    ///
    /// An explicitly requested file (argument or `TALKGEN_CONFIG`) must
    /// exist and parse. A missing default-location file is not an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        if let Some(path) = explicit {
            let config = Self::from_file(&path)?;
            info!("Loaded configuration from {}", path.display());
            return Ok(config);
        }

        match default_config_file() {
            Some(path) => {
                let config = Self::from_file(&path)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => {
                warn!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values that would make the service unusable
    pub fn validate(&self) -> Result<()> {
        if self.inference_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "inference_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::InvalidInput(
                "max_upload_bytes must be greater than 0".to_string(),
            ));
        }
        if let Some(backend) = &self.backend {
            if backend.program.trim().is_empty() {
                return Err(Error::InvalidInput(
                    "backend.program must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Staging directory, defaulting to the OS temp dir
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Find the first existing config file in the platform search path
fn default_config_file() -> Option<PathBuf> {
    candidate_config_files().into_iter().find(|p| p.exists())
}

/// Platform search path for `config.toml`
pub fn candidate_config_files() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("talkgen").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        candidates.push(PathBuf::from("/etc/talkgen/config.toml"));
    }
    candidates
}
