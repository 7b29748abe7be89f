//! In-memory page source

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::{ArchiveEntryRef, ArchiveEntrySource, EntryId};
use crate::error::ArchiveError;

#[derive(Debug, Clone)]
struct StoredEntry {
    name: String,
    data: Bytes,
    layout: Option<Bytes>,
}

/// Entries held in memory, e.g. already extracted from an archive
#[derive(Debug, Default)]
pub struct MemoryArchive {
    entries: RwLock<HashMap<EntryId, StoredEntry>>,
    next_id: AtomicU64,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry and return its handle
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Bytes>) -> ArchiveEntryRef {
        let name = name.into();
        let data = data.into();

        let id = EntryId(self.next_id.fetch_add(1, Ordering::Relaxed));

        let entry = ArchiveEntryRef::new(id, name.clone(), data.len() as u64);
        self.entries.write().insert(
            id,
            StoredEntry {
                name,
                data,
                layout: None,
            },
        );
        entry
    }

    /// Replace the bytes of an existing entry
    ///
    /// Returns the updated handle, or `None` if the entry is unknown.
    pub fn replace(&self, id: &EntryId, data: impl Into<Bytes>) -> Option<ArchiveEntryRef> {
        let mut entries = self.entries.write();
        let stored = entries.get_mut(id)?;
        stored.data = data.into();
        Some(ArchiveEntryRef::new(
            *id,
            stored.name.clone(),
            stored.data.len() as u64,
        ))
    }

    /// Attach pane layout JSON to an entry
    ///
    /// Returns `false` if the entry is unknown.
    pub fn insert_layout(&self, id: &EntryId, layout: impl Into<Bytes>) -> bool {
        match self.entries.write().get_mut(id) {
            Some(stored) => {
                stored.layout = Some(layout.into());
                true
            }
            None => false,
        }
    }

    /// Remove an entry
    pub fn remove(&self, id: &EntryId) -> bool {
        self.entries.write().remove(id).is_some()
    }

    /// All entries ordered by name
    pub fn entries(&self) -> Vec<ArchiveEntryRef> {
        let mut refs: Vec<ArchiveEntryRef> = self
            .entries
            .read()
            .iter()
            .map(|(id, stored)| {
                ArchiveEntryRef::new(*id, stored.name.clone(), stored.data.len() as u64)
            })
            .collect();
        refs.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        refs
    }
}

#[async_trait]
impl ArchiveEntrySource for MemoryArchive {
    async fn fetch_bytes(&self, id: &EntryId) -> Result<Bytes, ArchiveError> {
        self.entries
            .read()
            .get(id)
            .map(|stored| stored.data.clone())
            .ok_or_else(|| ArchiveError::NotFound {
                entry: id.to_string(),
            })
    }

    fn entry_name(&self, id: &EntryId) -> Option<String> {
        self.entries.read().get(id).map(|stored| stored.name.clone())
    }

    async fn fetch_layout(&self, id: &EntryId) -> Result<Option<Bytes>, ArchiveError> {
        self.entries
            .read()
            .get(id)
            .map(|stored| stored.layout.clone())
            .ok_or_else(|| ArchiveError::NotFound {
                entry: id.to_string(),
            })
    }
}
