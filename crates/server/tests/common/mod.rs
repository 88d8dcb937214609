//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! over a temp directory, with the `MockToolkit` standing in for the
//! external conversion tools.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use webpit_core::{
    testing::MockToolkit, Config, ConversionOrchestrator, ConversionStatus, ConversionStore,
    JsonFileStore, MediaToolkit, OrchestratorConfig, StorageConfig,
};
use webpit_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use webpit_core::testing::fixtures;

const BOUNDARY: &str = "webpit-test-boundary";

/// Test fixture for API testing with a mock toolkit.
///
/// The orchestrator is not started; tests drive the scheduler with
/// [`TestFixture::tick`] so promotion is deterministic.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_upload() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.upload(&[("file", fixtures::jpeg_bytes())]).await;
///
///     assert_eq!(response.status, StatusCode::CREATED);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Orchestrator behind the router
    pub orchestrator: ConversionOrchestrator,
    /// Mock toolkit - control mime types, failures and free space
    pub toolkit: Arc<MockToolkit>,
    /// Temporary storage root
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default limits.
    pub async fn new() -> Self {
        Self::with_config(OrchestratorConfig::default()).await
    }

    /// Create a test fixture with custom orchestrator limits.
    pub async fn with_config(orchestrator_config: OrchestratorConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let config = Config {
            storage: StorageConfig {
                root: temp_dir.path().to_path_buf(),
            },
            orchestrator: orchestrator_config,
            ..Default::default()
        };

        let toolkit = Arc::new(MockToolkit::new());
        toolkit.set_conversion_delay(Duration::ZERO).await;
        let store: Arc<dyn ConversionStore> =
            Arc::new(JsonFileStore::new(config.storage.data_dir()));

        let orchestrator = ConversionOrchestrator::new(
            config.orchestrator.clone(),
            config.storage.files_dir(),
            store,
            Arc::clone(&toolkit) as Arc<dyn MediaToolkit>,
        );

        let state = Arc::new(AppState::new(config, orchestrator.clone()));
        let router = create_router(state);

        Self {
            router,
            orchestrator,
            toolkit,
            temp_dir,
        }
    }

    /// Run one scheduler pass.
    pub fn tick(&self) {
        self.orchestrator.tick();
    }

    /// Tick until the record reaches `status`.
    pub async fn wait_for_status(&self, id: &str, status: ConversionStatus) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            self.tick();
            if let Ok(handle) = self.orchestrator.get(id).await {
                if handle.status() == status {
                    return true;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    /// Upload files and wait until each is converted. Returns the first record.
    pub async fn converted_upload(&self) -> Value {
        let response = self.upload(&[("file", fixtures::jpeg_bytes())]).await;
        assert_eq!(response.status, StatusCode::CREATED);
        let record = response.body["conversions"][0].clone();
        let id = record["id"].as_str().unwrap().to_string();
        assert!(self.wait_for_status(&id, ConversionStatus::Completed).await);
        record
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(path).body(Body::empty()).unwrap())
            .await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Send a POST request with JSON body.
    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        self.post_raw(path, &serde_json::to_vec(&body).unwrap(), "application/json")
            .await
    }

    /// Send a POST request with custom content type.
    pub async fn post_raw(&self, path: &str, body: &[u8], content_type: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("Content-Type", content_type)
                .header("User-Agent", "webpit-tests")
                .body(Body::from(body.to_vec()))
                .unwrap(),
        )
        .await
    }

    /// POST /convert with one multipart part per `(field, bytes)`.
    pub async fn upload(&self, parts: &[(&str, Vec<u8>)]) -> TestResponse {
        let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
        self.post_raw("/convert", &multipart_body(parts), &content_type)
            .await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }
}

/// Encodes `multipart/form-data` with the fixture boundary.
pub fn multipart_body(parts: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (index, (field, bytes)) in parts.iter().enumerate() {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"upload{}\"\r\n",
                field, index
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
