//! API tests for the conversion endpoints.
//!
//! The full router runs in-process over a temp directory with the mock
//! toolkit; the scheduler is ticked by hand.

mod common;

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use sha2::{Digest, Sha256};
use webpit_core::{testing::FAKE_WEBP, ConversionStatus, OrchestratorConfig};

use common::{fixtures, TestFixture};

const UNKNOWN_ID: &str = "00000000-0000-4000-8000-000000000000";

// =============================================================================
// POST /convert
// =============================================================================

#[tokio::test]
async fn test_upload_creates_queued_conversion() {
    let fixture = TestFixture::new().await;

    let response = fixture.upload(&[("file", fixtures::jpeg_bytes())]).await;

    assert_status!(response, StatusCode::CREATED);
    let conversions = response.body["conversions"].as_array().unwrap();
    assert_eq!(conversions.len(), 1);

    let record = &conversions[0];
    assert_eq!(record["status"], "queued");
    assert_eq!(record["input_source"], "stream");
    assert_eq!(record["input_hash"].as_str().unwrap().len(), 64);
    assert_eq!(record["download_token"].as_str().unwrap().len(), 32);
    assert!(record["created"].is_string());

    let id = record["id"].as_str().unwrap();
    let handle = fixture.orchestrator.get(id).await.unwrap();
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.user_agent(), Some("webpit-tests"));
    assert_eq!(snapshot.input_mime(), Some("image/jpeg"));
}

#[tokio::test]
async fn test_upload_multiple_files() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .upload(&[
            ("files", fixtures::jpeg_bytes()),
            ("files", fixtures::png_bytes()),
            ("ignored", b"not a file field".to_vec()),
        ])
        .await;

    assert_status!(response, StatusCode::CREATED);
    let conversions = response.body["conversions"].as_array().unwrap();
    assert_eq!(conversions.len(), 2);
    assert_ne!(conversions[0]["id"], conversions[1]["id"]);
    assert_eq!(fixture.orchestrator.registered(), 2);
}

#[tokio::test]
async fn test_json_content_upload() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_json(
            "/convert",
            json!({ "request": [{ "content": STANDARD.encode(fixtures::png_bytes()) }] }),
        )
        .await;

    assert_status!(response, StatusCode::CREATED);
    assert_eq!(response.body["conversions"][0]["input_source"], "content");
}

#[tokio::test]
async fn test_json_unsupported_url_scheme_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_json(
            "/convert",
            json!({ "request": [{ "url": "ftp://example.com/image.png" }] }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_GATEWAY);
    assert_eq!(fixture.orchestrator.registered(), 0);
}

#[tokio::test]
async fn test_convert_without_inputs_is_bad_request() {
    let fixture = TestFixture::new().await;

    let response = fixture.post_raw("/convert", b"hello", "text/plain").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "bad request");

    let response = fixture.post_json("/convert", json!({ "request": [] })).await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture.upload(&[("file", Vec::new())]).await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture
        .post_raw("/convert", b"{ not json", "application/json")
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_too_many_files() {
    let fixture = TestFixture::with_config(OrchestratorConfig {
        max_files: 2,
        ..Default::default()
    })
    .await;

    let response = fixture
        .upload(&[
            ("files", fixtures::jpeg_bytes()),
            ("files", fixtures::jpeg_bytes()),
            ("files", fixtures::jpeg_bytes()),
        ])
        .await;

    assert_status!(response, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(fixture.orchestrator.registered(), 0);
}

#[tokio::test]
async fn test_low_disk_space_rejects_uploads() {
    let fixture = TestFixture::new().await;
    fixture.toolkit.set_free_space(Some(1024)).await;
    fixture.orchestrator.sample_disk().await;

    let response = fixture.upload(&[("file", fixtures::jpeg_bytes())]).await;

    assert_status!(response, StatusCode::INSUFFICIENT_STORAGE);
    assert_eq!(fixture.orchestrator.registered(), 0);
}

#[tokio::test]
async fn test_oversized_file_rolls_back_request() {
    let fixture = TestFixture::with_config(OrchestratorConfig {
        max_size_mb: 1,
        ..Default::default()
    })
    .await;

    let response = fixture
        .upload(&[
            ("files", fixtures::jpeg_bytes()),
            ("files", vec![0xAB; 1024 * 1024 + 1]),
        ])
        .await;

    assert_status!(response, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(fixture.orchestrator.registered(), 0);
    let data_dir = fixture.temp_dir.path().join("data");
    let leftover = std::fs::read_dir(&data_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}

// =============================================================================
// GET /query
// =============================================================================

#[tokio::test]
async fn test_query_lifecycle() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/query").await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture.get(&format!("/query?id={}", UNKNOWN_ID)).await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "not found");

    let upload = fixture.upload(&[("file", fixtures::jpeg_bytes())]).await;
    let id = upload.body["conversions"][0]["id"].as_str().unwrap().to_string();

    let response = fixture.get(&format!("/query?id={}", id)).await;
    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(response.body["status"], "queued");

    assert!(fixture.wait_for_status(&id, ConversionStatus::Completed).await);

    let response = fixture.get(&format!("/query?id={}", id)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "completed");
    assert_eq!(response.body["output_size"], FAKE_WEBP.len());
    assert!(response.body["expires"].is_string());
    assert!(response.body.get("error").is_none());
}

#[tokio::test]
async fn test_query_failed_conversion_reports_error() {
    let fixture = TestFixture::new().await;

    let upload = fixture.upload(&[("file", fixtures::zip_bytes())]).await;
    let id = upload.body["conversions"][0]["id"].as_str().unwrap().to_string();
    assert!(fixture.wait_for_status(&id, ConversionStatus::Failed).await);

    let response = fixture.get(&format!("/query?id={}", id)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "failed");
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("unsupported"));
}

#[tokio::test]
async fn test_query_empty_document_is_processing() {
    let fixture = TestFixture::new().await;
    let data_dir = fixture.temp_dir.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(data_dir.join(format!("{}.json", UNKNOWN_ID)), b"").unwrap();

    let response = fixture.get(&format!("/query?id={}", UNKNOWN_ID)).await;
    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(response.body["status"], "processing");
}

// =============================================================================
// GET /download
// =============================================================================

#[tokio::test]
async fn test_download_requires_id_and_token() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/download").await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture.get(&format!("/download?id={}", UNKNOWN_ID)).await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture
        .get(&format!("/download?id={}&token=abc", UNKNOWN_ID))
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_wrong_token_is_forbidden() {
    let fixture = TestFixture::new().await;
    let record = fixture.converted_upload().await;
    let id = record["id"].as_str().unwrap();

    let response = fixture
        .get(&format!("/download?id={}&token=wrong", id))
        .await;

    assert_status!(response, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "forbidden");
}

#[tokio::test]
async fn test_download_token_prefix_is_forbidden() {
    let fixture = TestFixture::new().await;
    let record = fixture.converted_upload().await;
    let id = record["id"].as_str().unwrap();
    let token = record["download_token"].as_str().unwrap();

    let response = fixture
        .get(&format!("/download?id={}&token={}", id, &token[..token.len() - 1]))
        .await;

    assert_status!(response, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_download_before_conversion_is_accepted() {
    let fixture = TestFixture::new().await;
    let upload = fixture.upload(&[("file", fixtures::jpeg_bytes())]).await;
    let record = &upload.body["conversions"][0];

    let response = fixture
        .get(&format!(
            "/download?id={}&token={}",
            record["id"].as_str().unwrap(),
            record["download_token"].as_str().unwrap()
        ))
        .await;

    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(response.body["status"], "queued");
}

#[tokio::test]
async fn test_download_completed_output() {
    let fixture = TestFixture::new().await;
    let record = fixture.converted_upload().await;
    let id = record["id"].as_str().unwrap();
    let token = record["download_token"].as_str().unwrap();

    let response = fixture
        .get(&format!("/download?id={}&token={}", id, token))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(&response.bytes[..], FAKE_WEBP);

    let header = |name: &str| {
        response
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    assert_eq!(header("content-type"), "image/webp");
    assert_eq!(header("content-length"), FAKE_WEBP.len().to_string());
    assert_eq!(
        header("content-disposition"),
        format!("inline; name=\"{}\"; filename=\"{}.webp\"", id, id)
    );
    assert_eq!(
        header("etag"),
        format!("\"{:x}\"", Sha256::digest(FAKE_WEBP))
    );
    assert!(header("expires").ends_with("GMT"));
    assert!(header("last-modified").ends_with("GMT"));
    assert!(header("x-powered-by").starts_with("WebPit/"));

    // The long parameter name works too
    let response = fixture
        .get(&format!("/download?id={}&download_token={}", id, token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_download_failed_conversion() {
    let fixture = TestFixture::new().await;
    fixture.toolkit.set_fail_exit_code(Some(1)).await;

    let upload = fixture.upload(&[("file", fixtures::jpeg_bytes())]).await;
    let record = upload.body["conversions"][0].clone();
    let id = record["id"].as_str().unwrap();
    assert!(fixture.wait_for_status(id, ConversionStatus::Failed).await);

    let response = fixture
        .get(&format!(
            "/download?id={}&token={}",
            id,
            record["download_token"].as_str().unwrap()
        ))
        .await;

    assert_status!(response, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["status"], "failed");
}

// =============================================================================
// DELETE /conversions/{id}
// =============================================================================

#[tokio::test]
async fn test_delete_conversion() {
    let fixture = TestFixture::new().await;
    let record = fixture.converted_upload().await;
    let id = record["id"].as_str().unwrap();
    let token = record["download_token"].as_str().unwrap();
    let output = fixture
        .temp_dir
        .path()
        .join("files")
        .join(format!("{}.webp", id));
    assert!(output.exists());

    let response = fixture.delete(&format!("/conversions/{}", id)).await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture
        .delete(&format!("/conversions/{}?token=wrong", id))
        .await;
    assert_status!(response, StatusCode::UNAUTHORIZED);

    let response = fixture
        .delete(&format!("/conversions/{}?token={}", id, token))
        .await;
    assert_status!(response, StatusCode::NO_CONTENT);
    assert!(!output.exists());

    let response = fixture.get(&format!("/query?id={}", id)).await;
    assert_status!(response, StatusCode::NOT_FOUND);
}
