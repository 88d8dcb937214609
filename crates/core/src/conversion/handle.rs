//! Live handle to one conversion record.

use chrono::{DateTime, Utc};
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::context::ConversionContext;
use super::error::ConversionError;
use super::input::{write_input, InputSource};
use super::types::{Conversion, ConversionStatus, InputKind};
use crate::converter::{MediaKind, WebpJob};
use crate::metrics;

/// Called with the record id once a delete has run.
pub type Deregister = Arc<dyn Fn(&str) + Send + Sync>;

/// Shared, cloneable view of a conversion record.
///
/// The in-memory record is the authority for scheduling decisions. Every
/// transition is persisted before or right after it becomes visible, and the
/// record lock is never held across an await point.
#[derive(Clone)]
pub struct ConversionHandle {
    record: Arc<RwLock<Conversion>>,
    ctx: Arc<ConversionContext>,
    deleting: Arc<AtomicBool>,
    deregister: Deregister,
}

impl ConversionHandle {
    pub(crate) fn new(record: Conversion, ctx: Arc<ConversionContext>, deregister: Deregister) -> Self {
        Self {
            record: Arc::new(RwLock::new(record)),
            ctx,
            deleting: Arc::new(AtomicBool::new(false)),
            deregister,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Conversion> {
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Conversion> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> String {
        self.read().id().to_string()
    }

    pub fn status(&self) -> ConversionStatus {
        self.read().status()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.read().created()
    }

    /// A copy of the record as it is right now.
    pub fn snapshot(&self) -> Conversion {
        self.read().clone()
    }

    pub fn is_expired(&self) -> bool {
        self.read().is_expired()
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting.load(Ordering::SeqCst)
    }

    /// Stores the input, inspects it and moves the record to `queued`.
    ///
    /// On failure the record stays `pending`.
    pub async fn set_input(&self, source: InputSource) -> Result<Conversion, ConversionError> {
        let current = self.snapshot();
        if current.status() != ConversionStatus::Pending {
            return Err(ConversionError::InvalidState {
                id: current.id().to_string(),
                status: current.status(),
            });
        }

        let kind = source.kind();
        let path = current.input_path().to_path_buf();
        let size = write_input(&path, source, self.ctx.settings().max_size, self.ctx.http()).await?;
        metrics::INPUT_BYTES
            .with_label_values(&[input_label(kind)])
            .inc_by(size);

        let toolkit = self.ctx.toolkit();
        let hash = toolkit.hash(&path).await?;
        let mime = toolkit.mime_type(&path).await?;

        let mut next = current;
        next.mark_queued(kind, mime, hash, size)?;
        self.ctx.store().save(&next).await?;

        {
            let mut record = self.write();
            if record.status() != ConversionStatus::Pending {
                return Err(ConversionError::InvalidState {
                    id: record.id().to_string(),
                    status: record.status(),
                });
            }
            *record = next.clone();
        }

        info!(
            id = %next.id(),
            mime = next.input_mime().unwrap_or_default(),
            size = size,
            "Conversion input stored"
        );
        Ok(next)
    }

    /// Runs the conversion to a terminal state.
    ///
    /// Fails immediately, without changing the record, when the record is
    /// still `pending` or already past `queued`.
    pub async fn convert(&self) -> Result<Conversion, ConversionError> {
        self.claim()?;
        self.run_claimed().await
    }

    /// Moves `queued` to `converting` in memory. Synchronous so the scheduler
    /// can claim a record within its pass.
    pub(crate) fn claim(&self) -> Result<(), ConversionError> {
        self.write().begin_converting(Utc::now())
    }

    /// Drives a claimed record to `completed` or `failed`.
    pub(crate) async fn run_claimed(&self) -> Result<Conversion, ConversionError> {
        let started = Instant::now();
        let kind = self
            .read()
            .input_mime()
            .and_then(MediaKind::from_mime);
        let kind_label = kind.map(|k| k.as_str()).unwrap_or("unknown");

        let result = self.run_pipeline(kind).await;
        if self.is_deleting() {
            self.discard_output().await;
        }

        metrics::CONVERSION_DURATION
            .with_label_values(&[kind_label])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(record) => {
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&[kind_label, "success"])
                    .inc();
                info!(
                    id = %record.id(),
                    kind = kind_label,
                    output_size = record.output_size().unwrap_or_default(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Conversion completed"
                );
                Ok(record)
            }
            Err(e) => {
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&[kind_label, "failed"])
                    .inc();
                metrics::CONVERSION_ERRORS
                    .with_label_values(&[e.kind()])
                    .inc();
                self.record_failure(&e).await;
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, kind: Option<MediaKind>) -> Result<Conversion, ConversionError> {
        let record = self.snapshot();
        self.persist(&record).await?;

        let kind = kind.ok_or_else(|| ConversionError::UnsupportedFormat {
            mime: record.input_mime().unwrap_or_default().to_string(),
        })?;

        let job = WebpJob {
            input_path: record.input_path().to_path_buf(),
            output_path: self.ctx.output_path(record.id()),
            options: record.output_options().clone(),
        };
        debug!(id = %record.id(), kind = %kind, "Starting encoder");

        let toolkit = self.ctx.toolkit();
        let output_path = {
            let _slot = self.ctx.in_flight().enter(kind);
            match kind {
                MediaKind::Image => toolkit.convert_image(&job).await?,
                MediaKind::Video => toolkit.convert_video(&job).await?,
            }
        };

        let output_size = toolkit.file_size(&output_path).await?;
        let output_hash = toolkit.hash(&output_path).await?;

        let mut next = record;
        next.mark_completed(
            output_path,
            output_size,
            output_hash,
            Utc::now(),
            self.ctx.settings().ttl,
        );
        self.persist(&next).await?;
        *self.write() = next.clone();
        Ok(next)
    }

    /// Removes an output the encoder wrote after the record was deleted.
    async fn discard_output(&self) {
        let output_path = self.ctx.output_path(&self.id());
        if let Err(e) = remove_if_exists(&output_path).await {
            warn!(path = %output_path.display(), error = %e, "Failed to remove orphaned output");
        }
    }

    /// Saves the record unless a delete has started.
    async fn persist(&self, record: &Conversion) -> Result<(), ConversionError> {
        if self.is_deleting() {
            debug!(id = %record.id(), "Skipping save of deleted conversion");
            return Ok(());
        }
        self.ctx.store().save(record).await?;
        Ok(())
    }

    /// Marks the record failed and persists it on a best-effort basis.
    async fn record_failure(&self, error: &ConversionError) {
        let failed = {
            let mut record = self.write();
            record.mark_failed(error.to_string(), Utc::now(), self.ctx.settings().ttl);
            record.clone()
        };
        warn!(id = %failed.id(), error = %error, "Conversion failed");

        if let Err(e) = self.persist(&failed).await {
            warn!(id = %failed.id(), error = %e, "Failed to persist conversion failure");
        }
    }

    /// Flags the record as being deleted. Returns false if a delete is
    /// already underway.
    pub(crate) fn begin_delete(&self) -> bool {
        !self.deleting.swap(true, Ordering::SeqCst)
    }

    /// Removes the document, input and output concurrently, then drops the
    /// record from the registry.
    ///
    /// Missing files are not an error. The record is deregistered even when
    /// a removal fails; the first failure is returned.
    pub async fn delete(&self) -> Result<(), ConversionError> {
        self.deleting.store(true, Ordering::SeqCst);
        let record = self.snapshot();
        let id = record.id();
        let output_path = self.ctx.output_path(id);

        let (document, input, output) = futures::join!(
            self.ctx.store().delete(id),
            remove_if_exists(record.input_path()),
            remove_if_exists(&output_path),
        );

        (self.deregister)(id);
        debug!(id = %id, "Conversion deleted");

        document?;
        input?;
        output?;
        Ok(())
    }
}

impl fmt::Debug for ConversionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionHandle")
            .field("record", &*self.read())
            .field("deleting", &self.is_deleting())
            .finish()
    }
}

fn input_label(kind: InputKind) -> &'static str {
    match kind {
        InputKind::Stream => "stream",
        InputKind::Content => "content",
        InputKind::Url => "url",
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), ConversionError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ConversionError::CleanupFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}
