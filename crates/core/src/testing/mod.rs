//! Testing utilities and mock implementations.
//!
//! This module provides a mock [`MediaToolkit`](crate::converter::MediaToolkit)
//! so the scheduler can be exercised end to end without `cwebp`, `ffmpeg` or
//! the coreutils installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use webpit_core::testing::{fixtures, MockToolkit};
//!
//! let toolkit = Arc::new(MockToolkit::new());
//! let orchestrator = ConversionOrchestrator::new(config, files_dir, store, toolkit.clone());
//!
//! let handle = orchestrator
//!     .create(InputSource::Content(fixtures::jpeg_bytes()), NewConversion::new())
//!     .await?;
//! ```

mod mock_toolkit;

pub use mock_toolkit::{MockToolkit, RecordedInvocation, FAKE_WEBP};

/// Test fixtures and helper functions.
pub mod fixtures {
    /// A buffer that sniffs as `image/jpeg`.
    pub fn jpeg_bytes() -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        bytes.extend_from_slice(b"JFIF\x00fake jpeg body");
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    /// A buffer that sniffs as `image/png`.
    pub fn png_bytes() -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(b"\x00\x00\x00\x0dIHDRfake png body");
        bytes
    }

    /// A buffer that sniffs as `video/mp4`.
    pub fn mp4_bytes() -> Vec<u8> {
        let mut bytes = b"\x00\x00\x00\x18ftypmp42".to_vec();
        bytes.extend_from_slice(b"\x00\x00\x00\x00mp42isomfake mp4 body");
        bytes
    }

    /// A buffer that sniffs as `application/zip`.
    pub fn zip_bytes() -> Vec<u8> {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend_from_slice(b"fake zip body");
        bytes
    }
}
