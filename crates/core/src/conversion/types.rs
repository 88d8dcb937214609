//! Core conversion record types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::ConversionError;
use crate::converter::OutputOptions;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle state of a conversion.
///
/// Transitions only move forward:
/// pending -> queued -> converting -> completed | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    /// Created, input not fully stored yet. Never promoted.
    Pending,
    /// Input stored, hash and mime known. Waiting for a conversion slot.
    Queued,
    /// An encoder is running for this record.
    Converting,
    /// Output written. Terminal.
    Completed,
    /// Conversion failed. Terminal.
    Failed,
}

impl ConversionStatus {
    /// All states in lifecycle order.
    pub const ALL: [ConversionStatus; 5] = [
        Self::Pending,
        Self::Queued,
        Self::Converting,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Converting => "converting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown conversion status: {}", s))
    }
}

// ============================================================================
// Input provenance
// ============================================================================

/// How the input bytes reached the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// A readable byte stream (multipart upload).
    Stream,
    /// An in-memory buffer.
    Content,
    /// Downloaded from a remote URL.
    Url,
}

/// Provenance supplied when a conversion is created.
#[derive(Debug, Clone, Default)]
pub struct NewConversion {
    pub user_agent: Option<String>,
    pub remote_address: Option<String>,
    /// Absolute path to store the input at. Relative paths are ignored.
    pub input_path: Option<PathBuf>,
}

impl NewConversion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_remote_address(mut self, remote_address: impl Into<String>) -> Self {
        self.remote_address = Some(remote_address.into());
        self
    }

    pub fn with_input_path(mut self, input_path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(input_path.into());
        self
    }
}

// ============================================================================
// Record
// ============================================================================

/// One conversion job as stored in `data/<id>.json`.
///
/// Fields are read-only outside the crate; state only changes through the
/// transition methods, which enforce forward-only movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    id: String,
    status: ConversionStatus,
    input_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_source: Option<InputKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_date: Option<DateTime<Utc>>,
    output_options: OutputOptions,
    download_token: String,
    created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checked: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_address: Option<String>,
}

impl Conversion {
    /// Creates a pending record with a fresh id and download token.
    pub(crate) fn new(request: NewConversion, options: OutputOptions, files_dir: &Path) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        let input_path = request
            .input_path
            .filter(|p| p.is_absolute())
            .unwrap_or_else(|| files_dir.join(&id));

        Self {
            id,
            status: ConversionStatus::Pending,
            input_path,
            input_source: None,
            input_mime: None,
            input_hash: None,
            input_size: None,
            output_path: None,
            output_hash: None,
            output_size: None,
            output_date: None,
            output_options: options,
            download_token: uuid::Uuid::new_v4().simple().to_string(),
            created: Utc::now(),
            checked: None,
            expires: None,
            error: None,
            user_agent: request.user_agent,
            remote_address: request.remote_address,
        }
    }

    /// pending -> queued, once the input is stored and inspected.
    pub(crate) fn mark_queued(
        &mut self,
        source: InputKind,
        mime: String,
        hash: String,
        size: u64,
    ) -> Result<(), ConversionError> {
        if self.status != ConversionStatus::Pending {
            return Err(ConversionError::InvalidState {
                id: self.id.clone(),
                status: self.status,
            });
        }
        self.input_source = Some(source);
        self.input_mime = Some(mime);
        self.input_hash = Some(hash);
        self.input_size = Some(size);
        self.status = ConversionStatus::Queued;
        Ok(())
    }

    /// queued -> converting. Leaves the record untouched on error.
    pub(crate) fn begin_converting(&mut self, now: DateTime<Utc>) -> Result<(), ConversionError> {
        match self.status {
            ConversionStatus::Pending => Err(ConversionError::InputPending {
                id: self.id.clone(),
            }),
            ConversionStatus::Queued => {
                self.status = ConversionStatus::Converting;
                self.checked = Some(now);
                Ok(())
            }
            status => Err(ConversionError::AlreadyConverted {
                id: self.id.clone(),
                status,
            }),
        }
    }

    /// converting -> completed.
    pub(crate) fn mark_completed(
        &mut self,
        output_path: PathBuf,
        output_size: u64,
        output_hash: String,
        now: DateTime<Utc>,
        ttl: Duration,
    ) {
        self.status = ConversionStatus::Completed;
        self.output_path = Some(output_path);
        self.output_size = Some(output_size);
        self.output_hash = Some(output_hash);
        self.output_date = Some(now);
        self.checked = Some(now);
        self.expires = Some(expiry(now, ttl));
    }

    /// Any non-terminal state -> failed. No-op on terminal records.
    pub(crate) fn mark_failed(&mut self, error: String, now: DateTime<Utc>, ttl: Duration) {
        if self.status.is_terminal() {
            return;
        }
        self.status = ConversionStatus::Failed;
        self.error = Some(error);
        self.checked = Some(now);
        self.expires = Some(expiry(now, ttl));
    }

    /// Compares `token` against the download token in constant time.
    pub fn token_matches(&self, token: &str) -> bool {
        constant_time_eq(self.download_token.as_bytes(), token.as_bytes())
    }

    /// True iff `expires` is set and not after `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> ConversionStatus {
        self.status
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn input_source(&self) -> Option<InputKind> {
        self.input_source
    }

    pub fn input_mime(&self) -> Option<&str> {
        self.input_mime.as_deref()
    }

    pub fn input_hash(&self) -> Option<&str> {
        self.input_hash.as_deref()
    }

    pub fn input_size(&self) -> Option<u64> {
        self.input_size
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    pub fn output_hash(&self) -> Option<&str> {
        self.output_hash.as_deref()
    }

    pub fn output_size(&self) -> Option<u64> {
        self.output_size
    }

    pub fn output_date(&self) -> Option<DateTime<Utc>> {
        self.output_date
    }

    pub fn output_options(&self) -> &OutputOptions {
        &self.output_options
    }

    pub fn download_token(&self) -> &str {
        &self.download_token
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn checked(&self) -> Option<DateTime<Utc>> {
        self.checked
    }

    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.expires
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }
}

/// Records never outlive this, whatever the configured TTL.
pub(crate) const MAX_TTL_DAYS: i64 = 3650;

/// `now + ttl`, capped at [`MAX_TTL_DAYS`] and saturating at the latest
/// representable instant.
fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    let ttl = ttl.min(Duration::days(MAX_TTL_DAYS));
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
