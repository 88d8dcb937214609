//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::types::WebpJob;
use crate::process::ProcessError;

/// The external tools a conversion needs.
///
/// Each method corresponds to one command whose output is post-processed as
/// text. Implementations must not keep any per-call state.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Returns the name of this toolkit implementation.
    fn name(&self) -> &str;

    /// Sniffs the mime type of a file from its content.
    async fn mime_type(&self, path: &Path) -> Result<String, ProcessError>;

    /// Computes the lowercase hex content digest of a file.
    async fn hash(&self, path: &Path) -> Result<String, ProcessError>;

    /// Returns the size of a file in bytes.
    async fn file_size(&self, path: &Path) -> Result<u64, ProcessError>;

    /// Returns the bytes available on the volume backing `dir`.
    async fn free_space(&self, dir: &Path) -> Result<u64, ProcessError>;

    /// Encodes a still image to WebP. Resolves with the output path.
    async fn convert_image(&self, job: &WebpJob) -> Result<PathBuf, ProcessError>;

    /// Encodes a video to animated WebP. Resolves with the output path.
    async fn convert_video(&self, job: &WebpJob) -> Result<PathBuf, ProcessError>;

    /// Validates that the toolkit is properly configured and ready.
    async fn validate(&self) -> Result<(), ProcessError> {
        Ok(())
    }
}
