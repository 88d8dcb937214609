//! Types shared by the toolkit and the conversion pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Top-level media category a conversion is dispatched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Still image, encoded with cwebp.
    Image,
    /// Video, encoded to animated WebP with ffmpeg.
    Video,
}

impl MediaKind {
    /// Picks the kind from the top-level category of a mime type.
    ///
    /// Returns `None` for anything that is neither `image/*` nor `video/*`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let category = mime.split('/').next()?.trim().to_ascii_lowercase();
        match category.as_str() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuning parameters snapshotted onto a record at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Maximum output width in pixels.
    pub width: u32,
    /// Maximum output height in pixels (video only; images keep aspect from width).
    pub height: u32,
    /// Encoder quality, 0-100.
    pub quality: u8,
    /// Maximum animated output duration in seconds.
    pub max_secs: u32,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            quality: 80,
            max_secs: 6,
        }
    }
}

/// One encoder invocation.
#[derive(Debug, Clone)]
pub struct WebpJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub options: OutputOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("image/jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("image/png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("video/mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("Video/QuickTime"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("application/zip"), None);
        assert_eq!(MediaKind::from_mime("text/plain"), None);
        assert_eq!(MediaKind::from_mime(""), None);
    }

    #[test]
    fn test_output_options_serialization() {
        let options = OutputOptions {
            width: 640,
            height: 480,
            quality: 70,
            max_secs: 3,
        };
        let json = serde_json::to_string(&options).unwrap();
        let parsed: OutputOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, options);
    }
}
