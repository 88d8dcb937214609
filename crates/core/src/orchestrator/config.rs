//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::converter::OutputOptions;

const MB: u64 = 1024 * 1024;

/// Limits and timings for the conversion scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Lifetime of a completed or failed conversion, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum input size in megabytes.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Maximum animated output duration in seconds.
    #[serde(default = "default_max_secs")]
    pub max_secs: u32,

    /// Maximum number of inputs accepted in one request.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default = "default_max_dimension")]
    pub max_width: u32,

    #[serde(default = "default_max_dimension")]
    pub max_height: u32,

    /// Encoder quality, 0-100.
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Maximum concurrent conversions. Must be at least 1.
    #[serde(default = "default_max_conversions")]
    pub max_conversions: usize,

    /// Uploads are refused when free space drops below this.
    #[serde(default = "default_min_free_space_mb")]
    pub min_free_space_mb: u64,

    /// How often the scheduler pass runs (milliseconds).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// How often free disk space is sampled (seconds).
    #[serde(default = "default_disk_sample_interval")]
    pub disk_sample_interval_secs: u64,

    /// Delay before the one-shot recovery scan (milliseconds).
    #[serde(default = "default_recovery_delay")]
    pub recovery_delay_ms: u64,

    /// Timeout for downloading URL inputs (seconds).
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

fn default_ttl_secs() -> u64 {
    2 * 24 * 60 * 60 // 2 days
}

fn default_max_size_mb() -> u64 {
    20
}

fn default_max_secs() -> u32 {
    6
}

fn default_max_files() -> usize {
    10
}

fn default_max_dimension() -> u32 {
    1024
}

fn default_quality() -> u8 {
    80
}

fn default_max_conversions() -> usize {
    4
}

fn default_min_free_space_mb() -> u64 {
    1024
}

fn default_tick_interval() -> u64 {
    500
}

fn default_disk_sample_interval() -> u64 {
    60
}

fn default_recovery_delay() -> u64 {
    2000
}

fn default_fetch_timeout() -> u64 {
    60
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_size_mb: default_max_size_mb(),
            max_secs: default_max_secs(),
            max_files: default_max_files(),
            max_width: default_max_dimension(),
            max_height: default_max_dimension(),
            quality: default_quality(),
            max_conversions: default_max_conversions(),
            min_free_space_mb: default_min_free_space_mb(),
            tick_interval_ms: default_tick_interval(),
            disk_sample_interval_secs: default_disk_sample_interval(),
            recovery_delay_ms: default_recovery_delay(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl OrchestratorConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(MB)
    }

    pub fn min_free_space_bytes(&self) -> u64 {
        self.min_free_space_mb.saturating_mul(MB)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn disk_sample_interval(&self) -> Duration {
        Duration::from_secs(self.disk_sample_interval_secs)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Options snapshotted onto every new record.
    pub fn output_options(&self) -> OutputOptions {
        OutputOptions {
            width: self.max_width,
            height: self.max_height,
            quality: self.quality,
            max_secs: self.max_secs,
        }
    }

    pub fn with_max_conversions(mut self, max: usize) -> Self {
        self.max_conversions = max;
        self
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_recovery_delay_ms(mut self, delay_ms: u64) -> Self {
        self.recovery_delay_ms = delay_ms;
        self
    }
}
