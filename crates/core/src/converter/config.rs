//! Configuration for the external tool chain.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Binary locations and watchdog limits for the command-line toolkit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolkitConfig {
    /// Path to the `file` binary (mime sniffing).
    #[serde(default = "default_file_path")]
    pub file_path: PathBuf,

    /// Path to the hashing binary. Must print `<hex digest> <filename>`.
    #[serde(default = "default_hash_path")]
    pub hash_path: PathBuf,

    /// Path to `stat` (file sizes).
    #[serde(default = "default_stat_path")]
    pub stat_path: PathBuf,

    /// Path to `df` (free space).
    #[serde(default = "default_df_path")]
    pub df_path: PathBuf,

    /// Path to the still image encoder.
    #[serde(default = "default_cwebp_path")]
    pub cwebp_path: PathBuf,

    /// Path to ffmpeg (animated WebP from video).
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Watchdog for a single conversion process, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Watchdog for the short inspection commands, in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,
}

fn default_file_path() -> PathBuf {
    PathBuf::from("file")
}

fn default_hash_path() -> PathBuf {
    PathBuf::from("sha256sum")
}

fn default_stat_path() -> PathBuf {
    PathBuf::from("stat")
}

fn default_df_path() -> PathBuf {
    PathBuf::from("df")
}

fn default_cwebp_path() -> PathBuf {
    PathBuf::from("cwebp")
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "error".to_string()
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            file_path: default_file_path(),
            hash_path: default_hash_path(),
            stat_path: default_stat_path(),
            df_path: default_df_path(),
            cwebp_path: default_cwebp_path(),
            ffmpeg_path: default_ffmpeg_path(),
            timeout_secs: default_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            ffmpeg_log_level: default_log_level(),
        }
    }
}

impl ToolkitConfig {
    /// Creates a config with custom encoder paths.
    pub fn with_encoders(cwebp_path: PathBuf, ffmpeg_path: PathBuf) -> Self {
        Self {
            cwebp_path,
            ffmpeg_path,
            ..Default::default()
        }
    }

    /// Sets the conversion watchdog in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
