//! Durable storage for conversion records.
//!
//! Each record is one JSON document named `<id>.json` under the data
//! directory. Writes for the same id are serialized and land atomically, so
//! a reader sees either the previous document or the new one.

mod error;
mod json_file;
mod traits;

pub use error::StoreError;
pub use json_file::JsonFileStore;
pub use traits::ConversionStore;
