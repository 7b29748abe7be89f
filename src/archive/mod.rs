//! Page byte sources
//!
//! Archive formats are handled outside this crate. A source only has to hand
//! out the raw bytes of a named entry, plus optional pane layout metadata.

pub mod directory;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ArchiveError;

pub use directory::DirectoryArchive;
pub use memory::MemoryArchive;

/// Opaque identifier of an entry inside one source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to one archive entry: identifier, name and stored size
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveEntryRef {
    pub id: EntryId,
    /// Path of the entry inside the archive (e.g. "vol1/p003.jpg")
    pub name: String,
    /// Size of the entry in bytes
    pub len: u64,
}

impl ArchiveEntryRef {
    pub fn new(id: EntryId, name: impl Into<String>, len: u64) -> Self {
        Self {
            id,
            name: name.into(),
            len,
        }
    }
}

/// Supplier of entry bytes
///
/// Implementations are shared between pages and must handle their own
/// synchronisation; pages never lock across entries.
#[async_trait]
pub trait ArchiveEntrySource: Send + Sync {
    /// Read the full contents of an entry
    async fn fetch_bytes(&self, id: &EntryId) -> Result<Bytes, ArchiveError>;

    /// Name of an entry, if it exists
    fn entry_name(&self, id: &EntryId) -> Option<String>;

    /// Pane layout metadata stored alongside an entry, as JSON
    ///
    /// Sources without layout support keep the default.
    async fn fetch_layout(&self, _id: &EntryId) -> Result<Option<Bytes>, ArchiveError> {
        Ok(None)
    }
}

/// Supported page image extensions (lowercase)
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "jfif", "png", "gif", "bmp", "webp", "tif", "tiff",
];

/// Check whether an entry name looks like a page image
///
/// Case-insensitive extension match.
pub fn is_image_name(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
