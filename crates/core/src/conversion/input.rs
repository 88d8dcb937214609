//! Input sources and writing them to disk.

use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::error::ConversionError;
use super::types::InputKind;

/// Where the bytes of a conversion come from.
pub enum InputSource {
    /// A readable byte stream, typically a multipart upload.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    /// Bytes already in memory.
    Content(Vec<u8>),
    /// An http(s) URL to download.
    Url(String),
}

impl InputSource {
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::Stream(Box::new(reader))
    }

    pub fn kind(&self) -> InputKind {
        match self {
            Self::Stream(_) => InputKind::Stream,
            Self::Content(_) => InputKind::Content,
            Self::Url(_) => InputKind::Url,
        }
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Content(bytes) => write!(f, "Content({} bytes)", bytes.len()),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

/// Writes the source to `path`, returning the number of bytes stored.
///
/// Inputs larger than `max_size` are rejected and any partial file removed.
pub(crate) async fn write_input(
    path: &Path,
    source: InputSource,
    max_size: u64,
    http: &reqwest::Client,
) -> Result<u64, ConversionError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let result = match source {
        InputSource::Content(bytes) => write_content(path, &bytes, max_size).await,
        InputSource::Stream(reader) => write_stream(path, reader, max_size).await,
        InputSource::Url(url) => write_url(path, &url, max_size, http).await,
    };

    if result.is_err() {
        let _ = tokio::fs::remove_file(path).await;
    }
    result
}

async fn write_content(path: &Path, bytes: &[u8], max_size: u64) -> Result<u64, ConversionError> {
    let len = bytes.len() as u64;
    if len > max_size {
        return Err(ConversionError::InputTooLarge { limit: max_size });
    }
    tokio::fs::write(path, bytes).await?;
    Ok(len)
}

async fn write_stream(
    path: &Path,
    reader: Box<dyn AsyncRead + Send + Unpin>,
    max_size: u64,
) -> Result<u64, ConversionError> {
    let mut file = File::create(path).await?;
    // One extra byte tells an exact-limit input apart from an oversized one.
    let mut limited = reader.take(max_size.saturating_add(1));
    let written = tokio::io::copy(&mut limited, &mut file).await?;
    file.flush().await?;

    if written > max_size {
        return Err(ConversionError::InputTooLarge { limit: max_size });
    }
    Ok(written)
}

async fn write_url(
    path: &Path,
    url: &str,
    max_size: u64,
    http: &reqwest::Client,
) -> Result<u64, ConversionError> {
    let fetch_failed = |reason: String| ConversionError::FetchFailed {
        url: url.to_string(),
        reason,
    };

    let lower = url.to_ascii_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return Err(fetch_failed("only http and https URLs are supported".to_string()));
    }

    debug!(url = %url, "Fetching input");
    let mut response = http
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| fetch_failed(e.to_string()))?;

    if response.content_length().is_some_and(|len| len > max_size) {
        return Err(ConversionError::InputTooLarge { limit: max_size });
    }

    let mut file = File::create(path).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| fetch_failed(e.to_string()))?
    {
        written += chunk.len() as u64;
        if written > max_size {
            return Err(ConversionError::InputTooLarge { limit: max_size });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(written)
}
