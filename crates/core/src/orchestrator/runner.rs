//! Conversion orchestrator implementation.
//!
//! Three background tasks share one registry:
//! - Scheduler: periodic pass that evicts expired records and promotes
//!   queued ones up to the concurrency ceiling
//! - Disk sampler: caches free space for admission control
//! - Recovery: one-shot scan that re-registers persisted records

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::conversion::{
    Conversion, ConversionContext, ConversionError, ConversionHandle, ConversionSettings,
    ConversionStatus, Deregister, InputSource, NewConversion, MAX_TTL_DAYS,
};
use crate::converter::MediaToolkit;
use crate::metrics;
use crate::store::ConversionStore;

use super::config::OrchestratorConfig;
use super::registry::Registry;
use super::types::{StatusSnapshot, TickReport};

/// Error recorded on records that were converting when the process stopped.
pub const INTERRUPTED_ERROR: &str = "conversion interrupted by restart";

/// Owns the live registry and drives queued records to completion.
#[derive(Clone)]
pub struct ConversionOrchestrator {
    config: OrchestratorConfig,
    ctx: Arc<ConversionContext>,
    registry: Arc<Registry>,
    snapshot: Arc<RwLock<StatusSnapshot>>,
    disk_free: Arc<RwLock<Option<u64>>>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ConversionOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        files_dir: impl Into<PathBuf>,
        store: Arc<dyn ConversionStore>,
        toolkit: Arc<dyn MediaToolkit>,
    ) -> Self {
        let settings = ConversionSettings {
            files_dir: files_dir.into(),
            ttl: chrono::Duration::from_std(config.ttl())
                .map(|ttl| ttl.min(chrono::Duration::days(MAX_TTL_DAYS)))
                .unwrap_or_else(|_| chrono::Duration::days(MAX_TTL_DAYS)),
            max_size: config.max_size_bytes(),
            output_options: config.output_options(),
            fetch_timeout: config.fetch_timeout(),
        };
        let ctx = Arc::new(ConversionContext::new(settings, store, toolkit));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            ctx,
            registry: Arc::new(Registry::default()),
            snapshot: Arc::new(RwLock::new(StatusSnapshot::default())),
            disk_free: Arc::new(RwLock::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the orchestrator (spawns background tasks).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!(
            max_conversions = self.config.max_conversions,
            tick_interval_ms = self.config.tick_interval_ms,
            "Starting conversion orchestrator"
        );

        if let Err(e) = tokio::fs::create_dir_all(self.ctx.files_dir()).await {
            warn!(
                dir = %self.ctx.files_dir().display(),
                error = %e,
                "Failed to create files directory"
            );
        }

        self.spawn_recovery();
        self.spawn_disk_sampler_loop();
        self.spawn_scheduler_loop();

        info!("Conversion orchestrator started");
    }

    /// Stop the orchestrator gracefully.
    ///
    /// Running conversions are left to finish on their own tasks.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping conversion orchestrator");
        let _ = self.shutdown_tx.send(());
        info!("Conversion orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Creates and registers an empty `pending` record.
    pub async fn new_conversion(
        &self,
        request: NewConversion,
    ) -> Result<ConversionHandle, ConversionError> {
        let settings = self.ctx.settings();
        let record = Conversion::new(
            request,
            settings.output_options.clone(),
            &settings.files_dir,
        );
        self.ctx.store().save(&record).await?;

        debug!(id = %record.id(), "Conversion created");
        Ok(self.register(record))
    }

    /// Creates a record and stores its input, leaving it `queued`.
    ///
    /// If the input cannot be stored the half-created record is deleted
    /// before the error is returned.
    pub async fn create(
        &self,
        input: InputSource,
        request: NewConversion,
    ) -> Result<ConversionHandle, ConversionError> {
        let handle = self.new_conversion(request).await?;
        if let Err(e) = handle.set_input(input).await {
            warn!(id = %handle.id(), error = %e, "Failed to store conversion input");
            if let Err(cleanup) = handle.delete().await {
                warn!(id = %handle.id(), error = %cleanup, "Failed to remove incomplete conversion");
            }
            return Err(e);
        }
        Ok(handle)
    }

    /// Looks a record up in the registry, falling back to the store.
    pub async fn get(&self, id: &str) -> Result<ConversionHandle, ConversionError> {
        if let Some(handle) = self.registry.get(id) {
            return Ok(handle);
        }
        let record = self.ctx.store().load(id).await?;
        Ok(self.register(record))
    }

    fn register(&self, record: Conversion) -> ConversionHandle {
        let handle = ConversionHandle::new(record, Arc::clone(&self.ctx), self.deregister());
        self.registry.insert_if_absent(handle)
    }

    fn deregister(&self) -> Deregister {
        let registry = Arc::downgrade(&self.registry);
        Arc::new(move |id: &str| {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        })
    }

    // =========================================================================
    // Scheduler
    // =========================================================================

    /// Runs one scheduler pass.
    ///
    /// Expired records are handed to deletion. Queued records are claimed in
    /// creation order while the number converting stays under the ceiling;
    /// the claim is synchronous so a record is never promoted twice. The
    /// converting count is taken at the start of the pass.
    pub fn tick(&self) -> TickReport {
        let handles = self.registry.ordered();
        let ceiling = self.config.max_conversions;
        let mut converting = handles
            .iter()
            .filter(|h| h.status() == ConversionStatus::Converting)
            .count();

        let now = Utc::now();
        let mut report = TickReport::default();

        for handle in handles {
            let record = handle.snapshot();

            if record.is_expired_at(now) {
                if handle.begin_delete() {
                    report.evicted.push(record.id().to_string());
                    Self::spawn_eviction(handle);
                }
                continue;
            }

            let mut status = record.status();
            if status == ConversionStatus::Queued && converting < ceiling {
                match handle.claim() {
                    Ok(()) => {
                        converting += 1;
                        status = ConversionStatus::Converting;
                        report.promoted.push(record.id().to_string());
                        metrics::PROMOTIONS.inc();
                        Self::spawn_conversion(handle);
                    }
                    Err(e) => debug!(id = %record.id(), error = %e, "Claim skipped"),
                }
            }
            report.snapshot.add(status);
        }

        self.publish(report.snapshot);
        if !report.promoted.is_empty() || !report.evicted.is_empty() {
            debug!(
                promoted = report.promoted.len(),
                evicted = report.evicted.len(),
                "Scheduler pass"
            );
        }
        report
    }

    fn spawn_conversion(handle: ConversionHandle) {
        tokio::spawn(async move {
            // Failures are recorded on the handle itself.
            let _ = handle.run_claimed().await;
        });
    }

    fn spawn_eviction(handle: ConversionHandle) {
        tokio::spawn(async move {
            let id = handle.id();
            match handle.delete().await {
                Ok(()) => {
                    metrics::EVICTIONS.inc();
                    info!(id = %id, "Evicted expired conversion");
                }
                Err(e) => warn!(id = %id, error = %e, "Failed to evict expired conversion"),
            }
        });
    }

    fn publish(&self, snapshot: StatusSnapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
        for status in ConversionStatus::ALL {
            metrics::CONVERSIONS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(snapshot.get(status) as i64);
        }
    }

    fn spawn_scheduler_loop(&self) {
        let this = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = self.config.tick_interval();

        tokio::spawn(async move {
            info!("Scheduler loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scheduler loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !this.running.load(Ordering::Relaxed) {
                            break;
                        }
                        this.tick();
                    }
                }
            }
            info!("Scheduler loop stopped");
        });
    }

    // =========================================================================
    // Disk space
    // =========================================================================

    /// Probes free space and caches it. Probe failures keep the previous value.
    pub async fn sample_disk(&self) -> Option<u64> {
        match self.ctx.toolkit().free_space(self.ctx.files_dir()).await {
            Ok(bytes) => {
                *self.disk_free.write().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
                metrics::DISK_FREE_BYTES.set(bytes.min(i64::MAX as u64) as i64);
                debug!(free_bytes = bytes, "Sampled disk space");
            }
            Err(e) => warn!(error = %e, "Failed to sample disk space"),
        }
        self.disk_free_space()
    }

    fn spawn_disk_sampler_loop(&self) {
        let this = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = self.config.disk_sample_interval();

        tokio::spawn(async move {
            info!("Disk sampler loop started");
            this.sample_disk().await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Disk sampler loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !this.running.load(Ordering::Relaxed) {
                            break;
                        }
                        this.sample_disk().await;
                    }
                }
            }
            info!("Disk sampler loop stopped");
        });
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Registers every persisted record not already live.
    ///
    /// Records found in `converting` have lost their process and are moved
    /// to `failed`. Unreadable documents are skipped. Returns the number of
    /// records registered.
    pub async fn recover(&self) -> Result<usize, ConversionError> {
        let store = self.ctx.store();
        let ids = store.list_ids().await?;
        let mut recovered = 0;

        for id in ids {
            if self.registry.contains(&id) {
                continue;
            }

            let mut record = match store.load(&id).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(id = %id, error = %e, "Skipping unreadable conversion");
                    continue;
                }
            };

            metrics::RECOVERED
                .with_label_values(&[record.status().as_str()])
                .inc();

            if record.status() == ConversionStatus::Converting {
                record.mark_failed(
                    INTERRUPTED_ERROR.to_string(),
                    Utc::now(),
                    self.ctx.settings().ttl,
                );
                if let Err(e) = store.save(&record).await {
                    warn!(id = %id, error = %e, "Failed to persist interrupted conversion");
                }
                info!(id = %id, "Marked interrupted conversion as failed");
            }

            self.register(record);
            recovered += 1;
        }

        if recovered > 0 {
            info!(count = recovered, "Recovered conversions");
        }
        Ok(recovered)
    }

    fn spawn_recovery(&self) {
        let this = self.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let delay = self.config.recovery_delay();

        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Recovery cancelled by shutdown");
                }
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = this.recover().await {
                        error!(error = %e, "Recovery scan failed");
                    }
                }
            }
        });
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Status counts from the last scheduler pass.
    pub fn status(&self) -> StatusSnapshot {
        *self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last sampled free space, `None` before the first successful sample.
    pub fn disk_free_space(&self) -> Option<u64> {
        *self.disk_free.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether new uploads should be accepted given the cached free space.
    ///
    /// Unknown free space is treated as enough.
    pub fn accepts_uploads(&self) -> bool {
        self.disk_free_space()
            .map_or(true, |free| free >= self.config.min_free_space_bytes())
    }

    pub fn converting_images(&self) -> usize {
        self.ctx.in_flight().images()
    }

    pub fn converting_videos(&self) -> usize {
        self.ctx.in_flight().videos()
    }

    /// Number of live records.
    pub fn registered(&self) -> usize {
        self.registry.len()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<ConversionContext> {
        &self.ctx
    }

    pub fn max_files(&self) -> usize {
        self.config.max_files
    }

    pub fn max_size(&self) -> u64 {
        self.config.max_size_bytes()
    }

    pub fn max_conversions(&self) -> usize {
        self.config.max_conversions
    }
}

impl std::fmt::Debug for ConversionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionOrchestrator")
            .field("config", &self.config)
            .field("registered", &self.registry.len())
            .field("running", &self.is_running())
            .finish()
    }
}
