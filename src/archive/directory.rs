//! Directory-backed page source
//!
//! Treats a folder of extracted page images as an archive. A file named
//! `<image>.panes.json` next to an image holds its pane layout.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{is_image_name, ArchiveEntryRef, ArchiveEntrySource, EntryId};
use crate::error::ArchiveError;

/// Suffix appended to an image file name to find its layout sidecar
pub const LAYOUT_SUFFIX: &str = ".panes.json";

#[derive(Debug, Clone)]
struct DirectoryEntry {
    name: String,
    path: PathBuf,
}

/// Page images found under a root directory
#[derive(Debug)]
pub struct DirectoryArchive {
    root: PathBuf,
    files: Vec<DirectoryEntry>,
    refs: Vec<ArchiveEntryRef>,
}

impl DirectoryArchive {
    /// Scan a directory tree for page images
    ///
    /// Entries are ordered by their path relative to `root`, with `/`
    /// separators, so identifiers are stable across runs.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let root = root.as_ref().to_path_buf();
        let root_name = root.display().to_string();
        if !root.is_dir() {
            return Err(ArchiveError::NotFound { entry: root_name });
        }

        debug!(root = %root.display(), "scanning page directory");

        let mut found = Vec::new();
        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry.map_err(|e| {
                let io = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory loop detected"));
                ArchiveError::io(root_name.clone(), io)
            })?;

            // Only process files (not directories)
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if !is_image_name(&name) {
                continue;
            }

            let len = entry.metadata().map(|m| m.len()).unwrap_or(0);
            found.push((
                DirectoryEntry {
                    name,
                    path: entry.path().to_path_buf(),
                },
                len,
            ));
        }

        found.sort_by(|a, b| a.0.name.cmp(&b.0.name));

        let refs = found
            .iter()
            .enumerate()
            .map(|(i, (file, len))| ArchiveEntryRef::new(EntryId(i as u64), file.name.clone(), *len))
            .collect();
        let files = found.into_iter().map(|(file, _)| file).collect::<Vec<_>>();

        info!(root = %root.display(), pages = files.len(), "opened page directory");

        Ok(Self { root, files, refs })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All page entries in path order
    pub fn entries(&self) -> &[ArchiveEntryRef] {
        &self.refs
    }

    fn file(&self, id: &EntryId) -> Result<&DirectoryEntry, ArchiveError> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.files.get(index))
            .ok_or_else(|| ArchiveError::NotFound {
                entry: id.to_string(),
            })
    }
}

fn layout_path(image: &Path) -> PathBuf {
    let mut name = image.as_os_str().to_os_string();
    name.push(LAYOUT_SUFFIX);
    PathBuf::from(name)
}

#[async_trait]
impl ArchiveEntrySource for DirectoryArchive {
    async fn fetch_bytes(&self, id: &EntryId) -> Result<Bytes, ArchiveError> {
        let file = self.file(id)?;
        let data = tokio::fs::read(&file.path)
            .await
            .map_err(|e| ArchiveError::io(file.name.clone(), e))?;
        Ok(Bytes::from(data))
    }

    fn entry_name(&self, id: &EntryId) -> Option<String> {
        self.file(id).ok().map(|file| file.name.clone())
    }

    async fn fetch_layout(&self, id: &EntryId) -> Result<Option<Bytes>, ArchiveError> {
        let file = self.file(id)?;
        match tokio::fs::read(layout_path(&file.path)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArchiveError::io(format!("{}{}", file.name, LAYOUT_SUFFIX), e)),
        }
    }
}
