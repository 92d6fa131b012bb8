//! talkgen-server - talking-head generation request service
//!
//! GET /health reports backend readiness; POST /generate turns an image and
//! an audio clip into a video (or the placeholder video while the backend is
//! not ready).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use talkgen_common::config::TomlConfig;
use talkgen_server::backend::{CommandBackend, InferenceBackend};
use talkgen_server::dispatch::GenerationDispatcher;
use talkgen_server::staging::Stager;
use talkgen_server::{build_router, device, placeholder, readiness, AppState};

const DEVICE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line arguments for talkgen-server
///
/// Each option overrides the matching TOML setting.
#[derive(Parser, Debug)]
#[command(name = "talkgen-server")]
#[command(about = "Talking-head video generation service")]
#[command(version)]
struct Args {
    /// Path to config.toml
    #[arg(short, long, env = "TALKGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to
    #[arg(long, env = "TALKGEN_BIND")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TALKGEN_PORT")]
    port: Option<u16>,

    /// Directory holding the backend's model assets
    #[arg(long, env = "TALKGEN_MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// Directory for per-request temporary files
    #[arg(long, env = "TALKGEN_STAGING_DIR")]
    staging_dir: Option<PathBuf>,
}

impl Args {
    fn apply(self, mut config: TomlConfig) -> TomlConfig {
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(model_path) = self.model_path {
            config.model_path = model_path;
        }
        if let Some(staging_dir) = self.staging_dir {
            config.staging_dir = Some(staging_dir);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let config = args.apply(config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("{},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting talkgen-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!(
        "Config: model_path={} threshold={} timeout={}s max_upload={} bytes",
        config.model_path.display(),
        config.readiness_threshold,
        config.inference_timeout_secs,
        config.max_upload_bytes
    );

    // Readiness is probed once; it does not change while running.
    let device = device::probe_device(DEVICE_PROBE_TIMEOUT).await;
    info!("Device: {}", device.device);
    let readiness = Arc::new(readiness::check_readiness(
        &config.model_path,
        config.readiness_threshold,
        device,
    ));

    let backend: Option<Arc<dyn InferenceBackend>> = match &config.backend {
        Some(backend_config) => {
            info!("Inference backend: {}", backend_config.program);
            Some(Arc::new(CommandBackend::from_config(backend_config)))
        }
        None => {
            warn!("No inference backend configured; /generate will return the placeholder video");
            None
        }
    };

    let placeholder = placeholder::load(config.placeholder_path.as_deref())
        .await
        .context("Failed to load placeholder video")?;

    let staging_dir = config.staging_dir();
    tokio::fs::create_dir_all(&staging_dir)
        .await
        .with_context(|| format!("Failed to create staging directory {}", staging_dir.display()))?;
    info!("Staging directory: {}", staging_dir.display());

    let dispatcher = GenerationDispatcher::new(
        readiness.clone(),
        backend,
        placeholder,
        Duration::from_secs(config.inference_timeout_secs),
    );
    let state = AppState::new(
        readiness,
        dispatcher,
        Stager::new(staging_dir),
        config.max_upload_bytes,
    );
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_address, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
