//! Error types for conversion operations.

use std::path::PathBuf;
use thiserror::Error;

use super::types::ConversionStatus;
use crate::process::ProcessError;
use crate::store::StoreError;

/// Errors that can occur while driving a conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// `convert` was called before the input finished storing.
    #[error("conversion {id} has no input yet")]
    InputPending { id: String },

    /// `convert` was called on a record already past `queued`.
    #[error("conversion {id} already converted (status: {status})")]
    AlreadyConverted { id: String, status: ConversionStatus },

    /// `set_input` was called on a record that is no longer pending.
    #[error("cannot set input on conversion {id} in status {status}")]
    InvalidState { id: String, status: ConversionStatus },

    /// The sniffed mime type is neither `image/*` nor `video/*`.
    #[error("unsupported format: {mime}")]
    UnsupportedFormat { mime: String },

    /// An external tool failed, timed out or was missing.
    #[error("process failed: {0}")]
    ProcessFailed(#[from] ProcessError),

    #[error("conversion not found: {0}")]
    NotFound(String),

    /// The document exists but is empty or mid-write.
    #[error("conversion {0} is still being written")]
    Processing(String),

    #[error("persistence failed: {0}")]
    PersistenceFailed(#[source] StoreError),

    /// Writing the input bytes to disk failed.
    #[error("failed to write content: {0}")]
    ContentWriteFailed(#[from] std::io::Error),

    #[error("input exceeds the {limit} byte limit")]
    InputTooLarge { limit: u64 },

    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// Removing a file during delete failed for a reason other than absence.
    #[error("failed to remove {}: {source}", .path.display())]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConversionError {
    /// Exit code of the failing tool, if this error came from one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ProcessFailed(e) => e.exit_code(),
            _ => None,
        }
    }

    /// Short machine-readable label, used for metrics and API error codes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputPending { .. } => "input_pending",
            Self::AlreadyConverted { .. } => "already_converted",
            Self::InvalidState { .. } => "invalid_state",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::ProcessFailed(ProcessError::Timeout { .. }) => "timeout",
            Self::ProcessFailed(_) => "process_failed",
            Self::NotFound(_) => "not_found",
            Self::Processing(_) => "processing",
            Self::PersistenceFailed(_) => "persistence_failed",
            Self::ContentWriteFailed(_) => "content_write_failed",
            Self::InputTooLarge { .. } => "input_too_large",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::CleanupFailed { .. } => "cleanup_failed",
        }
    }
}

impl From<StoreError> for ConversionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Processing(id) => Self::Processing(id),
            other => Self::PersistenceFailed(other),
        }
    }
}
