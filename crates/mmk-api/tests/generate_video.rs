//! Router-level tests against mocked providers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mmk_api::{create_router, ApiConfig, AppState, GenerationOrchestrator};
use mmk_providers::{FalQueueAdapter, FalQueueConfig, ReplicateAdapter, ReplicateConfig};
use mmk_storage::{FalStorageConfig, FalStorageStager};

const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

fn replicate_router(server: &MockServer) -> Router {
    let adapter = ReplicateAdapter::new(ReplicateConfig {
        base_url: server.uri(),
        poll_interval: Duration::from_millis(10),
        ..ReplicateConfig::new("test-token")
    });
    let orchestrator = GenerationOrchestrator::new(Arc::new(adapter), None);
    create_router(
        AppState::with_orchestrator(ApiConfig::default(), orchestrator),
        None,
    )
}

fn fal_router(server: &MockServer) -> Router {
    let adapter = FalQueueAdapter::new(FalQueueConfig {
        queue_url: server.uri(),
        model_id: "fal-ai/test-model".to_string(),
        poll_interval: Duration::from_millis(10),
        ..FalQueueConfig::new("test-key")
    });
    let stager = FalStorageStager::new(FalStorageConfig {
        base_url: server.uri(),
        api_key: "test-key".to_string(),
    });
    let orchestrator = GenerationOrchestrator::new(Arc::new(adapter), Some(Arc::new(stager)));
    create_router(
        AppState::with_orchestrator(ApiConfig::default(), orchestrator),
        None,
    )
}

async fn post_json(app: Router, uri: &str, body: String) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn mount_replicate_success(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .and(body_partial_json(json!({
            "input": { "prompt": "a cat runs", "aspect_ratio": "16:9", "video_length": 97 }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "p1",
            "status": "succeeded",
            "output": ["https://cdn.example/video.mp4"]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_synchronous_round_trip() {
    let server = MockServer::start().await;
    mount_replicate_success(&server).await;

    let body = json!({ "prompt": "a cat runs", "aspectRatio": "16:9", "videoLength": 97 });
    let (status, json) = post_json(replicate_router(&server), "/generate-video", body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "videoUrl": "https://cdn.example/video.mp4" }));
}

#[tokio::test]
async fn test_front_end_path() {
    let server = MockServer::start().await;
    mount_replicate_success(&server).await;

    let body = json!({ "prompt": "a cat runs", "aspectRatio": "16:9", "videoLength": 97 });
    let (status, _) = post_json(replicate_router(&server), "/api/generate-video", body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_prompt_is_400_without_provider_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let (status, json) = post_json(
        replicate_router(&server),
        "/generate-video",
        json!({ "prompt": "  " }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json, json!({ "error": "Prompt is required" }));
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let server = MockServer::start().await;

    let (status, json) = post_json(
        replicate_router(&server),
        "/generate-video",
        "{\"prompt\": ".to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_provider_error_is_generic_500_called_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let (status, json) = post_json(
        replicate_router(&server),
        "/generate-video",
        json!({ "prompt": "a cat runs" }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({ "error": "Failed to generate video" }));
}

#[tokio::test]
async fn test_queued_round_trip_with_staging() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/storage/upload/initiate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "upload_url": format!("{}/upload/img-1", server.uri()),
            "file_url": "https://storage.example/img.png"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload/img-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/fal-ai/test-model"))
        .and(body_partial_json(json!({ "image_url": "https://storage.example/img.png" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request_id": "req-1",
            "status_url": format!("{}/fal-ai/test-model/requests/req-1/status", server.uri()),
            "response_url": format!("{}/fal-ai/test-model/requests/req-1", server.uri())
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fal-ai/test-model/requests/req-1/status"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "status": "IN_PROGRESS",
            "logs": [{ "message": "denoising" }]
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fal-ai/test-model/requests/req-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "COMPLETED" })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fal-ai/test-model/requests/req-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "video": { "url": "https://cdn.example/out.mp4" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let body = json!({ "prompt": "waves roll in", "image": PNG_DATA_URI });
    let (status, json) = post_json(fal_router(&server), "/generate-video", body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "videoUrl": "https://cdn.example/out.mp4" }));
}

#[tokio::test]
async fn test_staging_failure_is_generic_500_without_submission() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/storage/upload/initiate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("storage offline"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/fal-ai/test-model"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let body = json!({ "prompt": "waves roll in", "image": PNG_DATA_URI });
    let (status, json) = post_json(fal_router(&server), "/generate-video", body.to_string()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json, json!({ "error": "Failed to generate video" }));
}

#[tokio::test]
async fn test_queued_backend_requires_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (status, json) = post_json(
        fal_router(&server),
        "/generate-video",
        json!({ "prompt": "waves" }).to_string(),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json,
        json!({ "error": "Image is required for image-to-video generation" })
    );
}

#[tokio::test]
async fn test_health_and_ready() {
    let server = MockServer::start().await;

    let response = replicate_router(&server)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let response = fal_router(&server)
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["backend"], "queued_subscribe");
    assert_eq!(json["staging"], "fal");
}
