//! Mock toolkit for testing.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::converter::{MediaKind, MediaToolkit, WebpJob};
use crate::process::ProcessError;

/// Bytes written as the fake encoder output.
pub const FAKE_WEBP: &[u8] = b"RIFF\x1a\x00\x00\x00WEBPVP8 \x0e\x00\x00\x00fake-webp-data";

/// A recorded encoder invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub kind: MediaKind,
    pub job: WebpJob,
    pub success: bool,
}

/// Mock implementation of the MediaToolkit trait.
///
/// Provides controllable behavior for testing:
/// - Sniffs mime types from magic bytes (JPEG, PNG, GIF, MP4, ZIP)
/// - Real SHA-256 hashes and file sizes
/// - Writes a small fake WebP instead of encoding
/// - Simulates failures, slow encoders and low disk space
/// - Tracks peak encoder concurrency
///
/// # Example
///
/// ```rust,ignore
/// use webpit_core::testing::MockToolkit;
///
/// let toolkit = MockToolkit::new();
/// toolkit.set_conversion_delay(Duration::from_millis(200)).await;
/// toolkit.set_free_space(Some(10 * 1024 * 1024)).await;
///
/// // Use in ConversionOrchestrator...
///
/// assert_eq!(toolkit.invocation_count().await, 1);
/// assert!(toolkit.peak_concurrency() <= 1);
/// ```
#[derive(Debug)]
pub struct MockToolkit {
    /// Recorded encoder invocations.
    invocations: Arc<RwLock<Vec<RecordedInvocation>>>,
    /// If set, the next encoder call fails with this error.
    next_error: Arc<RwLock<Option<ProcessError>>>,
    /// If set, every encoder call exits with this code.
    fail_exit_code: Arc<RwLock<Option<i32>>>,
    /// Whether hashing fails.
    fail_hash: Arc<RwLock<bool>>,
    /// Overrides sniffed mime types when set.
    mime_override: Arc<RwLock<Option<String>>>,
    /// Simulated encoder duration.
    conversion_delay: Arc<RwLock<Duration>>,
    /// Reported free space; `None` makes the probe fail.
    free_space: Arc<RwLock<Option<u64>>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Default for MockToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl MockToolkit {
    /// Create a new mock toolkit.
    pub fn new() -> Self {
        Self {
            invocations: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            fail_exit_code: Arc::new(RwLock::new(None)),
            fail_hash: Arc::new(RwLock::new(false)),
            mime_override: Arc::new(RwLock::new(None)),
            conversion_delay: Arc::new(RwLock::new(Duration::from_millis(10))),
            free_space: Arc::new(RwLock::new(Some(100 * 1024 * 1024 * 1024))),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all recorded invocations.
    pub async fn recorded_invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.read().await.clone()
    }

    /// Get the number of encoder invocations.
    pub async fn invocation_count(&self) -> usize {
        self.invocations.read().await.len()
    }

    /// Configure the next encoder call to fail with the given error.
    pub async fn set_next_error(&self, error: ProcessError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every encoder call exit with `code` (`None` to succeed again).
    pub async fn set_fail_exit_code(&self, code: Option<i32>) {
        *self.fail_exit_code.write().await = code;
    }

    pub async fn set_fail_hash(&self, fail: bool) {
        *self.fail_hash.write().await = fail;
    }

    /// Report this mime type for every file instead of sniffing.
    pub async fn set_mime_override(&self, mime: Option<String>) {
        *self.mime_override.write().await = mime;
    }

    /// Set the simulated encoder duration.
    pub async fn set_conversion_delay(&self, delay: Duration) {
        *self.conversion_delay.write().await = delay;
    }

    /// Set the reported free space; `None` makes the probe fail.
    pub async fn set_free_space(&self, bytes: Option<u64>) {
        *self.free_space.write().await = bytes;
    }

    /// Highest number of encoders observed running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Encoders running right now.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Sniffs a mime type from leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> &'static str {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            "image/jpeg"
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            "image/png"
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            "image/gif"
        } else if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
            "video/mp4"
        } else if bytes.starts_with(b"PK\x03\x04") {
            "application/zip"
        } else if bytes.is_empty() {
            "inode/x-empty"
        } else {
            "application/octet-stream"
        }
    }

    async fn read(path: &Path) -> Result<Vec<u8>, ProcessError> {
        tokio::fs::read(path).await.map_err(|e| ProcessError::Io {
            program: "mock".to_string(),
            source: e,
        })
    }

    async fn encode(&self, kind: MediaKind, job: &WebpJob) -> Result<PathBuf, ProcessError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        let result = self.run_encoder(kind, job).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.invocations.write().await.push(RecordedInvocation {
            kind,
            job: job.clone(),
            success: result.is_ok(),
        });
        result
    }

    async fn run_encoder(&self, kind: MediaKind, job: &WebpJob) -> Result<PathBuf, ProcessError> {
        let program = match kind {
            MediaKind::Image => "cwebp",
            MediaKind::Video => "ffmpeg",
        };

        let delay = *self.conversion_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if let Some(code) = *self.fail_exit_code.read().await {
            return Err(ProcessError::Failed {
                program: program.to_string(),
                code: Some(code),
                stderr: "simulated failure".to_string(),
            });
        }

        let io_err = |e: std::io::Error| ProcessError::Io {
            program: program.to_string(),
            source: e,
        };
        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&job.output_path, FAKE_WEBP)
            .await
            .map_err(io_err)?;
        Ok(job.output_path.clone())
    }
}

#[async_trait]
impl MediaToolkit for MockToolkit {
    fn name(&self) -> &str {
        "mock"
    }

    async fn mime_type(&self, path: &Path) -> Result<String, ProcessError> {
        if let Some(mime) = self.mime_override.read().await.clone() {
            return Ok(mime);
        }
        let bytes = Self::read(path).await?;
        Ok(Self::sniff(&bytes).to_string())
    }

    async fn hash(&self, path: &Path) -> Result<String, ProcessError> {
        if *self.fail_hash.read().await {
            return Err(ProcessError::Failed {
                program: "sha256sum".to_string(),
                code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }
        let bytes = Self::read(path).await?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    async fn file_size(&self, path: &Path) -> Result<u64, ProcessError> {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.len())
            .map_err(|e| ProcessError::Io {
                program: "stat".to_string(),
                source: e,
            })
    }

    async fn free_space(&self, _dir: &Path) -> Result<u64, ProcessError> {
        let free = *self.free_space.read().await;
        free.ok_or_else(|| ProcessError::Failed {
                program: "df".to_string(),
                code: Some(1),
                stderr: "simulated failure".to_string(),
            })
    }

    async fn convert_image(&self, job: &WebpJob) -> Result<PathBuf, ProcessError> {
        self.encode(MediaKind::Image, job).await
    }

    async fn convert_video(&self, job: &WebpJob) -> Result<PathBuf, ProcessError> {
        self.encode(MediaKind::Video, job).await
    }
}
