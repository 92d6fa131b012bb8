//! Backend readiness probe
//!
//! Runs once at startup. The resulting [`ReadinessState`] is immutable and
//! shared by the health endpoint and the generation dispatcher.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::device::DeviceInfo;

/// Startup snapshot of whether the inference backend can be used
#[derive(Debug, Clone)]
pub struct ReadinessState {
    pub backend_ready: bool,
    /// Model asset directory that was probed
    pub model_path: PathBuf,
    /// Number of entries found in `model_path` (0 if unreadable)
    pub entry_count: usize,
    pub threshold: usize,
    /// Human-readable diagnostics, empty when ready
    pub reasons: Vec<String>,
    pub device: DeviceInfo,
}

impl ReadinessState {
    /// Readiness with an explicit outcome, bypassing the filesystem probe
    pub fn fixed(backend_ready: bool, model_path: impl Into<PathBuf>, device: DeviceInfo) -> Self {
        Self {
            backend_ready,
            model_path: model_path.into(),
            entry_count: 0,
            threshold: 0,
            reasons: if backend_ready {
                Vec::new()
            } else {
                vec!["backend marked not ready".to_string()]
            },
            device,
        }
    }
}

/// Probe the model asset directory
///
/// Ready only if `model_path` is a directory holding more than `threshold`
/// entries. An unreadable location counts as not ready.
pub fn check_readiness(model_path: &Path, threshold: usize, device: DeviceInfo) -> ReadinessState {
    let mut reasons = Vec::new();

    let entry_count = match std::fs::read_dir(model_path) {
        Ok(entries) => entries.filter_map(|e| e.ok()).count(),
        Err(e) => {
            reasons.push(format!(
                "model path {} is not readable: {}",
                model_path.display(),
                e
            ));
            0
        }
    };

    if reasons.is_empty() && entry_count <= threshold {
        reasons.push(format!(
            "model path {} has {} entries, need more than {}",
            model_path.display(),
            entry_count,
            threshold
        ));
    }

    let backend_ready = reasons.is_empty();
    if backend_ready {
        info!(
            "✓ Backend ready: {} entries in {}",
            entry_count,
            model_path.display()
        );
    } else {
        for reason in &reasons {
            warn!("Backend not ready: {}", reason);
        }
    }

    ReadinessState {
        backend_ready,
        model_path: model_path.to_path_buf(),
        entry_count,
        threshold,
        reasons,
        device,
    }
}
