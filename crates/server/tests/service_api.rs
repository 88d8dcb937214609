//! API tests for the service endpoints: health, status and metrics.

mod common;

use axum::http::StatusCode;
use webpit_core::{ConversionStatus, OrchestratorConfig};

use common::{fixtures, TestFixture};

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/nope").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_reports_limits() {
    let fixture = TestFixture::with_config(
        OrchestratorConfig {
            max_files: 4,
            max_size_mb: 2,
            ..Default::default()
        }
        .with_max_conversions(3),
    )
    .await;

    let response = fixture.get("/status").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["running"], false);
    assert_eq!(response.body["accepts_uploads"], true);
    assert!(response.body["disk_free_bytes"].is_null());
    assert_eq!(response.body["limits"]["max_files"], 4);
    assert_eq!(response.body["limits"]["max_size_bytes"], 2 * 1024 * 1024);
    assert_eq!(response.body["limits"]["max_conversions"], 3);
    assert_eq!(response.body["conversions"]["queued"], 0);
}

#[tokio::test]
async fn test_status_counts_records() {
    let fixture = TestFixture::new().await;

    fixture
        .upload(&[
            ("files", fixtures::jpeg_bytes()),
            ("files", fixtures::zip_bytes()),
        ])
        .await;
    let response = fixture.get("/status").await;
    assert_eq!(response.body["registered"], 2);

    // Drive both to a terminal state
    let start = std::time::Instant::now();
    loop {
        fixture.tick();
        let snapshot = fixture.orchestrator.status();
        if snapshot.completed == 1 && snapshot.failed == 1 {
            break;
        }
        assert!(
            start.elapsed() < std::time::Duration::from_secs(5),
            "conversions did not finish"
        );
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let response = fixture.get("/status").await;
    assert_eq!(response.body["conversions"]["completed"], 1);
    assert_eq!(response.body["conversions"]["failed"], 1);
    assert_eq!(response.body["converting_images"], 0);
    assert_eq!(
        fixture.orchestrator.status().get(ConversionStatus::Queued),
        0
    );
}

#[tokio::test]
async fn test_status_reflects_disk_sample() {
    let fixture = TestFixture::new().await;
    fixture.toolkit.set_free_space(Some(1024)).await;
    fixture.orchestrator.sample_disk().await;

    let response = fixture.get("/status").await;

    assert_eq!(response.body["disk_free_bytes"], 1024);
    assert_eq!(response.body["accepts_uploads"], false);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;

    // Generate some traffic first
    fixture.get("/health").await;
    fixture.converted_upload().await;

    let response = fixture.get("/metrics").await;

    assert_eq!(response.status, StatusCode::OK);
    let content_type = response
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("text/plain"));

    let text = String::from_utf8(response.bytes.to_vec()).unwrap();
    assert!(text.contains("webpit_http_requests_total"));
    assert!(text.contains("webpit_conversions_total"));
    assert!(text.contains("webpit_orchestrator_running"));
    assert!(text.contains("webpit_conversions_registered"));
}
