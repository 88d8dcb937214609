//! Live conversion handles, keyed by id.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::conversion::ConversionHandle;

#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: RwLock<HashMap<String, ConversionHandle>>,
}

impl Registry {
    pub(crate) fn get(&self, id: &str) -> Option<ConversionHandle> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Inserts the handle unless the id is already registered, returning
    /// whichever handle ends up in the registry.
    pub(crate) fn insert_if_absent(&self, handle: ConversionHandle) -> ConversionHandle {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.entry(handle.id()).or_insert(handle).clone()
    }

    pub(crate) fn remove(&self, id: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// All handles ordered by creation time, then id.
    pub(crate) fn ordered(&self) -> Vec<ConversionHandle> {
        let mut keyed: Vec<(DateTime<Utc>, String, ConversionHandle)> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, handle)| (handle.created(), id.clone(), handle.clone()))
            .collect();
        keyed.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        keyed.into_iter().map(|(_, _, handle)| handle).collect()
    }
}
