//! Accelerator detection for health diagnostics

use serde::Serialize;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Accelerator description reported by `/health`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// "cuda" when a GPU was found, otherwise "cpu"
    pub device: String,
    pub cuda_available: bool,
    pub gpu_name: Option<String>,
    /// Total GPU memory, e.g. "24.0 GB"
    pub gpu_memory: Option<String>,
}

impl DeviceInfo {
    pub fn cpu() -> Self {
        Self {
            device: "cpu".to_string(),
            cuda_available: false,
            gpu_name: None,
            gpu_memory: None,
        }
    }

    pub fn cuda(gpu_name: String, gpu_memory: String) -> Self {
        Self {
            device: "cuda".to_string(),
            cuda_available: true,
            gpu_name: Some(gpu_name),
            gpu_memory: Some(gpu_memory),
        }
    }
}

/// Query the first GPU through `nvidia-smi`
///
/// Any failure (tool missing, non-zero exit, unexpected output, timeout)
/// reports the CPU device.
pub async fn probe_device(timeout: Duration) -> DeviceInfo {
    let query = Command::new("nvidia-smi")
        .args([
            "--query-gpu=name,memory.total",
            "--format=csv,noheader,nounits",
        ])
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, query).await {
        Ok(Ok(output)) if output.status.success() => output,
        Ok(Ok(output)) => {
            debug!("nvidia-smi exited with {}", output.status);
            return DeviceInfo::cpu();
        }
        Ok(Err(e)) => {
            debug!("nvidia-smi unavailable: {}", e);
            return DeviceInfo::cpu();
        }
        Err(_) => {
            debug!("nvidia-smi timed out after {:?}", timeout);
            return DeviceInfo::cpu();
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_gpu_query(&stdout) {
        Some((name, memory)) => {
            info!("GPU detected: {} ({})", name, memory);
            DeviceInfo::cuda(name, memory)
        }
        None => DeviceInfo::cpu(),
    }
}

/// Parse `name, memory_mib` from the first line of the GPU query
pub fn parse_gpu_query(stdout: &str) -> Option<(String, String)> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (name, memory) = line.rsplit_once(',')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let mib: f64 = memory.trim().parse().ok()?;
    Some((name.to_string(), format!("{:.1} GB", mib / 1024.0)))
}
