use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversion not found: {0}")]
    NotFound(String),

    /// The document exists but is empty or not yet parseable.
    #[error("conversion {0} is still being written")]
    Processing(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error for {id}: {source}")]
    Serialization {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}
