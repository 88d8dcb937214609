//! Conversion API handlers.
//!
//! - `POST /convert` stores one or more inputs and returns their records
//! - `GET /query` reports a record's status
//! - `GET /download` serves the WebP once converted
//! - `DELETE /conversions/{id}` removes a record and its files

use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequest, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use webpit_core::{
    Conversion, ConversionError, ConversionHandle, ConversionStatus, InputKind, InputSource,
    NewConversion,
};

use super::error::{bad_request, conversion_error, error, forbidden, not_found, ApiError};
use crate::metrics::{DOWNLOADS_TOTAL, UPLOADS_REJECTED};
use crate::state::AppState;

/// Multipart field names that carry files.
const FILE_FIELDS: [&str; 3] = ["file", "files", "files[]"];

// ============================================================================
// Request/Response Types
// ============================================================================

/// JSON body for `POST /convert`.
#[derive(Debug, Deserialize)]
pub struct ConvertBody {
    #[serde(default)]
    pub request: Vec<ConvertItem>,
}

/// One input in a JSON convert request. `content` wins over `url`.
#[derive(Debug, Deserialize)]
pub struct ConvertItem {
    /// Base64 encoded file contents
    pub content: Option<String>,
    /// http(s) URL to fetch
    pub url: Option<String>,
}

/// A freshly created record.
#[derive(Debug, Serialize)]
pub struct ConversionSummary {
    pub id: String,
    pub created: String,
    pub download_token: String,
    pub input_hash: Option<String>,
    pub input_source: Option<InputKind>,
    pub status: ConversionStatus,
}

impl From<&Conversion> for ConversionSummary {
    fn from(record: &Conversion) -> Self {
        Self {
            id: record.id().to_string(),
            created: record.created().to_rfc3339(),
            download_token: record.download_token().to_string(),
            input_hash: record.input_hash().map(str::to_string),
            input_source: record.input_source(),
            status: record.status(),
        }
    }
}

/// Response for `POST /convert`
#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub conversions: Vec<ConversionSummary>,
}

/// Response for `GET /query`
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub id: String,
    pub status: ConversionStatus,
    pub created: String,
    pub input_hash: Option<String>,
    pub input_source: Option<InputKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_mime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Conversion> for QueryResponse {
    fn from(record: &Conversion) -> Self {
        Self {
            id: record.id().to_string(),
            status: record.status(),
            created: record.created().to_rfc3339(),
            input_hash: record.input_hash().map(str::to_string),
            input_source: record.input_source(),
            input_mime: record.input_mime().map(str::to_string),
            output_size: record.output_size(),
            expires: record.expires().map(|t| t.to_rfc3339()),
            error: record.error().map(str::to_string),
        }
    }
}

/// Query parameters for `GET /query`
#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub id: Option<String>,
}

/// Query parameters for `GET /download`
#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub id: Option<String>,
    pub token: Option<String>,
    pub download_token: Option<String>,
}

impl DownloadParams {
    fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .or(self.download_token.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// Query parameters for `DELETE /conversions/{id}`
#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub token: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /convert
///
/// Accepts `multipart/form-data` with `file`/`files` fields, or JSON
/// `{"request":[{"content": "<base64>"} | {"url": "..."}]}`.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<ConvertResponse>), ApiError> {
    let orchestrator = state.orchestrator();

    if !orchestrator.accepts_uploads() {
        UPLOADS_REJECTED
            .with_label_values(&["insufficient_storage"])
            .inc();
        warn!(
            free_bytes = ?orchestrator.disk_free_space(),
            "Rejecting upload, disk space below threshold"
        );
        return Err(error(StatusCode::INSUFFICIENT_STORAGE, "insufficient storage"));
    }

    let metadata = request_metadata(&request);
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let max_files = orchestrator.max_files();

    let inputs = if content_type.starts_with("application/json") {
        let Json(body) = Json::<ConvertBody>::from_request(request, &())
            .await
            .map_err(|_| bad_request())?;
        json_inputs(body, max_files)?
    } else if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|_| bad_request())?;
        multipart_inputs(multipart, max_files).await?
    } else {
        return Err(bad_request());
    };

    if inputs.is_empty() {
        return Err(bad_request());
    }

    let count = inputs.len();
    let creations = inputs
        .into_iter()
        .map(|input| orchestrator.create(input, metadata.clone()));
    let results = futures::future::join_all(creations).await;

    let mut handles: Vec<ConversionHandle> = Vec::with_capacity(count);
    let mut failure: Option<ConversionError> = None;
    for result in results {
        match result {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                failure.get_or_insert(e);
            }
        }
    }

    // All or nothing
    if let Some(e) = failure {
        for handle in &handles {
            if let Err(cleanup) = handle.delete().await {
                warn!(id = %handle.id(), error = %cleanup, "Failed to roll back conversion");
            }
        }
        warn!(error = %e, "Convert request failed");
        return Err(conversion_error(&e));
    }

    let conversions: Vec<ConversionSummary> = handles
        .iter()
        .map(|h| ConversionSummary::from(&h.snapshot()))
        .collect();
    info!(count = conversions.len(), "Conversions queued");

    Ok((StatusCode::CREATED, Json(ConvertResponse { conversions })))
}

/// GET /query?id=
///
/// 202 while the record is still moving, 200 once terminal.
pub async fn query(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let id = match params.id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(bad_request()),
    };

    let handle = match state.orchestrator().get(id).await {
        Ok(handle) => handle,
        Err(ConversionError::Processing(_)) => return Ok(processing(id)),
        Err(ConversionError::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(conversion_error(&e)),
    };

    let record = handle.snapshot();
    let code = if record.status().is_terminal() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((code, Json(QueryResponse::from(&record))).into_response())
}

/// GET /download?id=&token=
///
/// Serves the WebP when the record is completed and the token matches.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    let (id, token) = match (params.id.as_deref(), params.token()) {
        (Some(id), Some(token)) if !id.is_empty() => (id, token),
        _ => return Err(bad_request()),
    };

    let handle = match state.orchestrator().get(id).await {
        Ok(handle) => handle,
        Err(ConversionError::Processing(_)) => return Ok(processing(id)),
        Err(ConversionError::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(conversion_error(&e)),
    };

    let record = handle.snapshot();
    if !record.token_matches(token) {
        DOWNLOADS_TOTAL.with_label_values(&["forbidden"]).inc();
        return Err(forbidden());
    }

    match record.status() {
        ConversionStatus::Completed => {}
        ConversionStatus::Failed => {
            DOWNLOADS_TOTAL.with_label_values(&["failed"]).inc();
            return Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": record.status(), "error": record.error() })),
            )
                .into_response());
        }
        status => {
            DOWNLOADS_TOTAL.with_label_values(&["not_ready"]).inc();
            return Ok((StatusCode::ACCEPTED, Json(json!({ "status": status }))).into_response());
        }
    }

    let output_path = record.output_path().ok_or_else(not_found)?;
    let bytes = match tokio::fs::read(output_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => {
            warn!(id = %id, error = %e, "Failed to read conversion output");
            return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "failed to read output"));
        }
    };

    DOWNLOADS_TOTAL.with_label_values(&["served"]).inc();
    debug!(id = %id, bytes = bytes.len(), "Serving conversion output");

    let headers = [
        (header::CONTENT_TYPE, "image/webp".to_string()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(record.id(), output_path),
        ),
        (header::CONTENT_LENGTH, bytes.len().to_string()),
        (
            header::LAST_MODIFIED,
            http_date(record.checked().unwrap_or_else(|| record.created())),
        ),
        (
            header::EXPIRES,
            record.expires().map(http_date).unwrap_or_default(),
        ),
        (
            header::ETAG,
            format!("\"{}\"", record.output_hash().unwrap_or_default()),
        ),
    ];
    Ok((StatusCode::OK, headers, bytes).into_response())
}

/// DELETE /conversions/{id}?token=
pub async fn delete_conversion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
    let token = match params.token.as_deref() {
        Some(token) if !token.is_empty() => token,
        _ => return Err(bad_request()),
    };

    let handle = match state.orchestrator().get(&id).await {
        Ok(handle) => handle,
        Err(ConversionError::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(conversion_error(&e)),
    };

    let record = handle.snapshot();
    if !record.token_matches(token) {
        return Err(forbidden());
    }
    if record.status() == ConversionStatus::Converting {
        return Err(error(StatusCode::CONFLICT, "conversion in progress"));
    }

    handle.delete().await.map_err(|e| conversion_error(&e))?;
    info!(id = %id, "Conversion deleted on request");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Helpers
// ============================================================================

fn request_metadata(request: &Request) -> NewConversion {
    let headers = request.headers();
    let mut metadata = NewConversion::new();

    if let Some(agent) = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
    {
        metadata = metadata.with_user_agent(agent);
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    if let Some(address) = forwarded.or(peer) {
        metadata = metadata.with_remote_address(address);
    }

    metadata
}

fn json_inputs(body: ConvertBody, max_files: usize) -> Result<Vec<InputSource>, ApiError> {
    let mut inputs = Vec::new();
    for item in body.request {
        let input = if let Some(content) = item.content {
            let bytes = STANDARD
                .decode(content.trim())
                .map_err(|_| error(StatusCode::BAD_REQUEST, "invalid base64 content"))?;
            InputSource::Content(bytes)
        } else if let Some(url) = item.url {
            InputSource::Url(url)
        } else {
            continue;
        };

        if inputs.len() == max_files {
            return Err(too_many_files(max_files));
        }
        inputs.push(input);
    }
    Ok(inputs)
}

async fn multipart_inputs(
    mut multipart: Multipart,
    max_files: usize,
) -> Result<Vec<InputSource>, ApiError> {
    let mut inputs = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|_| bad_request())? {
        let name = field.name().unwrap_or_default().to_string();
        if !FILE_FIELDS.contains(&name.as_str()) {
            continue;
        }

        let bytes = field.bytes().await.map_err(|e| {
            error(
                StatusCode::BAD_REQUEST,
                format!("Failed to read file: {}", e),
            )
        })?;
        // An empty part is a file input left blank
        if bytes.is_empty() {
            continue;
        }

        if inputs.len() == max_files {
            return Err(too_many_files(max_files));
        }
        inputs.push(InputSource::stream(std::io::Cursor::new(bytes)));
    }
    Ok(inputs)
}

fn too_many_files(max_files: usize) -> ApiError {
    UPLOADS_REJECTED
        .with_label_values(&["too_many_files"])
        .inc();
    error(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("too many files, at most {} per request", max_files),
    )
}

fn processing(id: &str) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "id": id, "status": "processing" })),
    )
        .into_response()
}

fn content_disposition(id: &str, path: &FsPath) -> String {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().replace('"', ""))
        .unwrap_or_else(|| format!("{}.webp", id));
    format!("inline; name=\"{}\"; filename=\"{}\"", id, filename)
}

/// IMF-fixdate as used by `Last-Modified` and `Expires`.
fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
