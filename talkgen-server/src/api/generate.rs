//! Video generation endpoint
//!
//! POST /generate: multipart `image` + `audio` in, `video/mp4` out.
//! Per request: intake, stage, dispatch, release. Release runs before the
//! response is returned, on success and failure alike.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Request, State},
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    routing::post,
    RequestExt, Router,
};
use tracing::info;

use crate::dispatch::GeneratedArtifact;
use crate::error::{ApiError, ApiResult};
use crate::intake::{extract_upload_pair, ValidationError};
use crate::AppState;

/// Tells clients whether they got real output or the placeholder
pub const SOURCE_HEADER: HeaderName = HeaderName::from_static("x-talkgen-source");

/// POST /generate
pub async fn generate(State(state): State<AppState>, request: Request) -> ApiResult<Response> {
    let multipart = request
        .extract::<Multipart, _>()
        .await
        .map_err(|e| ValidationError::Malformed(e.body_text()))?;
    let uploads = extract_upload_pair(multipart).await?;

    let staged = state.stager.stage(&uploads).await.map_err(ApiError::Staging)?;
    let outcome = state.dispatcher.dispatch(&staged).await;
    staged.release().await;

    let artifact = outcome?;
    info!(
        "Returning {} video ({} bytes)",
        artifact.source.as_str(),
        artifact.bytes.len()
    );
    Ok(video_response(artifact))
}

fn video_response(artifact: GeneratedArtifact) -> Response {
    (
        [
            (header::CONTENT_TYPE, artifact.content_type),
            (header::CONTENT_DISPOSITION, "inline; filename=\"generated.mp4\""),
            (SOURCE_HEADER, artifact.source.as_str()),
        ],
        artifact.bytes,
    )
        .into_response()
}

/// Build generation routes with the upload size limit applied
pub fn generate_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
