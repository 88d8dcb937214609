use async_trait::async_trait;

use super::StoreError;
use crate::conversion::Conversion;

/// Storage backend for conversion records.
#[async_trait]
pub trait ConversionStore: Send + Sync {
    /// Persist the full record, replacing any previous document.
    async fn save(&self, conversion: &Conversion) -> Result<(), StoreError>;

    /// Load a record by id.
    ///
    /// Fails with [`StoreError::NotFound`] when absent and
    /// [`StoreError::Processing`] when the document is empty or unparseable.
    async fn load(&self, id: &str) -> Result<Conversion, StoreError>;

    async fn exists(&self, id: &str) -> Result<bool, StoreError>;

    /// Remove a record. Absent records are not an error.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Ids of every stored record, in no particular order.
    async fn list_ids(&self) -> Result<Vec<String>, StoreError>;
}
