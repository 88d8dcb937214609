//! Shared dependencies every conversion handle works against.

use chrono::Duration;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::converter::{MediaKind, MediaToolkit, OutputOptions};
use crate::metrics;
use crate::store::ConversionStore;

/// Settings captured when the context is built.
#[derive(Debug, Clone)]
pub struct ConversionSettings {
    /// Where inputs and outputs live.
    pub files_dir: PathBuf,
    /// Lifetime of a terminal record.
    pub ttl: Duration,
    /// Upper bound on stored input bytes.
    pub max_size: u64,
    /// Options snapshotted onto each new record.
    pub output_options: OutputOptions,
    /// Timeout for fetching URL inputs.
    pub fetch_timeout: std::time::Duration,
}

/// Store, toolkit and counters shared by all handles of one orchestrator.
pub struct ConversionContext {
    settings: ConversionSettings,
    store: Arc<dyn ConversionStore>,
    toolkit: Arc<dyn MediaToolkit>,
    in_flight: InFlight,
    http: reqwest::Client,
}

impl ConversionContext {
    pub fn new(
        settings: ConversionSettings,
        store: Arc<dyn ConversionStore>,
        toolkit: Arc<dyn MediaToolkit>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(settings.fetch_timeout)
            .build()
            .unwrap_or_default();

        Self {
            settings,
            store,
            toolkit,
            in_flight: InFlight::default(),
            http,
        }
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn ConversionStore> {
        &self.store
    }

    pub fn toolkit(&self) -> &Arc<dyn MediaToolkit> {
        &self.toolkit
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Where the WebP output of a record is written.
    pub fn output_path(&self, id: &str) -> PathBuf {
        self.settings.files_dir.join(format!("{}.webp", id))
    }

    pub fn files_dir(&self) -> &Path {
        &self.settings.files_dir
    }
}

impl fmt::Debug for ConversionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionContext")
            .field("settings", &self.settings)
            .field("toolkit", &self.toolkit.name())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

/// Number of encoders currently running, per media kind.
#[derive(Debug, Default)]
pub struct InFlight {
    images: AtomicUsize,
    videos: AtomicUsize,
}

impl InFlight {
    fn counter(&self, kind: MediaKind) -> &AtomicUsize {
        match kind {
            MediaKind::Image => &self.images,
            MediaKind::Video => &self.videos,
        }
    }

    /// Counts one running encoder until the guard is dropped.
    pub fn enter(&self, kind: MediaKind) -> InFlightGuard<'_> {
        self.counter(kind).fetch_add(1, Ordering::SeqCst);
        metrics::CONVERSIONS_IN_FLIGHT
            .with_label_values(&[kind.as_str()])
            .inc();
        InFlightGuard {
            counter: self.counter(kind),
            kind,
        }
    }

    pub fn get(&self, kind: MediaKind) -> usize {
        self.counter(kind).load(Ordering::SeqCst)
    }

    pub fn images(&self) -> usize {
        self.get(MediaKind::Image)
    }

    pub fn videos(&self) -> usize {
        self.get(MediaKind::Video)
    }
}

/// Releases an in-flight slot when dropped.
pub struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
    kind: MediaKind,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        metrics::CONVERSIONS_IN_FLIGHT
            .with_label_values(&[self.kind.as_str()])
            .dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_releases() {
        let in_flight = InFlight::default();
        {
            let _a = in_flight.enter(MediaKind::Image);
            let _b = in_flight.enter(MediaKind::Image);
            let _c = in_flight.enter(MediaKind::Video);
            assert_eq!(in_flight.images(), 2);
            assert_eq!(in_flight.videos(), 1);
        }
        assert_eq!(in_flight.images(), 0);
        assert_eq!(in_flight.videos(), 0);
    }
}
