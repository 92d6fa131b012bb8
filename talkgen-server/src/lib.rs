//! talkgen-server library - talking-head generation request service
//!
//! Accepts an image and an audio clip, hands them to an external
//! video-synthesis backend, and returns the video. While the backend is
//! unavailable a fixed placeholder video is returned instead.

pub mod api;
pub mod backend;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod intake;
pub mod placeholder;
pub mod readiness;
pub mod staging;

pub use crate::error::{ApiError, ApiResult};

use axum::response::{IntoResponse, Response};
use axum::Router;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::dispatch::GenerationDispatcher;
use crate::readiness::ReadinessState;
use crate::staging::Stager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Startup readiness snapshot (read-only)
    pub readiness: Arc<ReadinessState>,
    pub dispatcher: Arc<GenerationDispatcher>,
    pub stager: Stager,
    pub max_upload_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Create application state; the dispatcher shares `readiness`
    pub fn new(
        readiness: Arc<ReadinessState>,
        dispatcher: GenerationDispatcher,
        stager: Stager,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            readiness,
            dispatcher: Arc::new(dispatcher),
            stager,
            max_upload_bytes,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::generate_routes(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(message).into_response()
}
