//! Integration tests for talkgen-server API endpoints
//!
//! Tests cover:
//! - Health endpoint (always 200, reports startup readiness)
//! - Upload validation (400, nothing staged)
//! - Placeholder fallback while the backend is not ready
//! - Backend success, failure and panic paths
//! - Staged files removed after every request

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`

use talkgen_server::backend::{InferenceBackend, InferenceError};
use talkgen_server::device::DeviceInfo;
use talkgen_server::dispatch::GenerationDispatcher;
use talkgen_server::placeholder::PLACEHOLDER_MP4;
use talkgen_server::readiness::ReadinessState;
use talkgen_server::staging::Stager;
use talkgen_server::{build_router, placeholder, AppState};

const BOUNDARY: &str = "talkgen-test-boundary";

/// 10-byte JPEG header
const JPEG_10: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
/// 10-byte WAV header
const WAV_10: &[u8] = b"RIFF$\0\0\0WA";

/// Backend test double
enum TestBackend {
    /// Copies the image to the output path
    Echo,
    Fail,
    Panic,
}

#[async_trait]
impl InferenceBackend for TestBackend {
    fn name(&self) -> &str {
        "test"
    }

    async fn run(&self, image: &Path, _audio: &Path, output: &Path) -> Result<(), InferenceError> {
        match self {
            TestBackend::Echo => {
                tokio::fs::copy(image, output)
                    .await
                    .map_err(|e| InferenceError::Other(e.to_string()))?;
                Ok(())
            }
            TestBackend::Fail => Err(InferenceError::Other(
                "RuntimeError: CUDA out of memory at /opt/models/net.pth".to_string(),
            )),
            TestBackend::Panic => panic!("backend bug"),
        }
    }
}

/// Test helper: app with a fixed readiness value and its own staging dir
fn setup_app(ready: bool, backend: Option<TestBackend>, staging: &TempDir) -> Router {
    let device = DeviceInfo::cuda("NVIDIA Test GPU".to_string(), "24.0 GB".to_string());
    let readiness = Arc::new(ReadinessState::fixed(ready, "/opt/models", device));
    let backend = backend.map(|b| Arc::new(b) as Arc<dyn InferenceBackend>);
    let dispatcher = GenerationDispatcher::new(
        readiness.clone(),
        backend,
        placeholder::builtin(),
        Duration::from_secs(10),
    );
    let state = AppState::new(readiness, dispatcher, Stager::new(staging.path()), 1024 * 1024);
    build_router(state)
}

/// Test helper: multipart body from (field, filename, bytes) parts
fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn generate_request(parts: &[(&str, &str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/generate")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn valid_request() -> Request<Body> {
    generate_request(&[("image", "face.jpg", JPEG_10), ("audio", "voice.wav", WAV_10)])
}

async fn body_bytes(body: Body) -> Bytes {
    body.collect().await.expect("Should read body").to_bytes()
}

async fn extract_json(body: Body) -> Value {
    serde_json::from_slice(&body_bytes(body).await).expect("Should parse JSON")
}

fn staged_count(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

// =============================================================================
// Health Endpoint
// =============================================================================

#[tokio::test]
async fn test_health_reports_not_ready() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(false, None, &staging);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["models_ready"], false);
    assert_eq!(body["model_path"], "/opt/models");
    assert_eq!(body["device"], "cuda");
    assert_eq!(body["cuda_available"], true);
    assert_eq!(body["gpu_name"], "NVIDIA Test GPU");
    assert_eq!(body["gpu_memory"], "24.0 GB");
    assert!(body["version"].is_string());
    assert!(body["readiness_reasons"].is_array());
}

#[tokio::test]
async fn test_health_reports_ready() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(true, Some(TestBackend::Echo), &staging);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["models_ready"], true);
    assert!(body.get("readiness_reasons").is_none());
}

// =============================================================================
// Upload Validation
// =============================================================================

#[tokio::test]
async fn test_missing_audio_is_400() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(false, None, &staging);

    let response = app
        .oneshot(generate_request(&[("image", "face.jpg", JPEG_10)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body, serde_json::json!({ "error": "No audio file provided" }));
    assert_eq!(staged_count(&staging), 0);
}

#[tokio::test]
async fn test_missing_image_is_400() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(true, Some(TestBackend::Echo), &staging);

    let response = app
        .oneshot(generate_request(&[("audio", "voice.wav", WAV_10)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "No image file provided");
    assert_eq!(staged_count(&staging), 0);
}

#[tokio::test]
async fn test_empty_image_is_400() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(false, None, &staging);

    let response = app
        .oneshot(generate_request(&[("image", "face.jpg", &b""[..]), ("audio", "voice.wav", WAV_10)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Empty image file provided");
    assert_eq!(staged_count(&staging), 0);
}

#[tokio::test]
async fn test_non_multipart_is_400() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(false, None, &staging);

    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid multipart request"));
    assert_eq!(staged_count(&staging), 0);
}

// =============================================================================
// Placeholder Fallback
// =============================================================================

#[tokio::test]
async fn test_not_ready_returns_placeholder() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(false, Some(TestBackend::Echo), &staging);

    let response = app.oneshot(valid_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.headers()["x-talkgen-source"], "placeholder");
    let body = body_bytes(response.into_body()).await;
    assert_eq!(body, PLACEHOLDER_MP4);
    assert_eq!(staged_count(&staging), 0);
}

#[tokio::test]
async fn test_placeholder_is_identical_across_requests() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(false, None, &staging);

    let first = app.clone().oneshot(valid_request()).await.unwrap();
    let first = body_bytes(first.into_body()).await;
    let second = app.oneshot(valid_request()).await.unwrap();
    let second = body_bytes(second.into_body()).await;

    assert_eq!(first, second);
    assert_eq!(first, PLACEHOLDER_MP4);
    assert_eq!(staged_count(&staging), 0);
}

// =============================================================================
// Backend Paths
// =============================================================================

#[tokio::test]
async fn test_ready_backend_output_returned() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(true, Some(TestBackend::Echo), &staging);

    let response = app.oneshot(valid_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.headers()["x-talkgen-source"], "backend");
    let body = body_bytes(response.into_body()).await;
    assert_eq!(body, JPEG_10);
    assert_eq!(staged_count(&staging), 0);
}

#[tokio::test]
async fn test_backend_failure_is_500_and_cleans_up() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(true, Some(TestBackend::Fail), &staging);

    let response = app.oneshot(valid_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Video generation failed");
    let details = body["details"].as_str().unwrap();
    assert!(!details.contains("/opt/models"));
    assert_eq!(staged_count(&staging), 0);
}

#[tokio::test]
async fn test_backend_panic_is_500_and_cleans_up() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(true, Some(TestBackend::Panic), &staging);

    let response = app.clone().oneshot(valid_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].is_string());
    assert!(body["details"].is_string());
    assert_eq!(staged_count(&staging), 0);

    // Service keeps answering after the panic
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_requests_clean_up() {
    let staging = TempDir::new().unwrap();
    let app = setup_app(true, Some(TestBackend::Echo), &staging);

    let requests = (0..8).map(|_| app.clone().oneshot(valid_request()));
    let responses = spawn_all(requests).await;

    for response in responses {
        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(staged_count(&staging), 0);
}

/// Spawn each future and wait for all of them
async fn spawn_all<F, T>(futures: impl Iterator<Item = F>) -> Vec<T>
where
    F: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = futures.map(tokio::spawn).collect();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}
