//! Error types shared across the crate
//!
//! Every error that can be cached in a page slot is `Clone`, so the same
//! failure can be handed to every caller until the page is invalidated.

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Failure reported by an archive entry source
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// The entry does not exist in the source
    #[error("archive entry not found: {entry}")]
    NotFound { entry: String },

    /// The entry exists but could not be read
    #[error("failed to read archive entry {entry}: {source}")]
    Io {
        entry: String,
        #[source]
        source: Arc<io::Error>,
    },
}

impl ArchiveError {
    pub fn io(entry: impl Into<String>, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            return Self::NotFound { entry: entry.into() };
        }
        Self::Io {
            entry: entry.into(),
            source: Arc::new(source),
        }
    }
}

/// Why a byte buffer could not be turned into an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeErrorKind {
    /// Data ends early; re-fetching the entry may help
    Truncated,
    /// Format not recognised or not supported; skip the page
    Unsupported,
    /// Recognised and complete, but the content is invalid
    Malformed,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Truncated => "truncated data",
            Self::Unsupported => "unsupported format",
            Self::Malformed => "malformed image",
        };
        f.write_str(label)
    }
}

/// Decode failure with enough context to diagnose the entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to decode '{entry}' ({len} bytes): {kind}: {message}")]
pub struct DecodeError {
    pub entry: String,
    pub len: usize,
    pub kind: DecodeErrorKind,
    pub message: String,
}

impl DecodeError {
    pub fn new(
        entry: impl Into<String>,
        len: usize,
        kind: DecodeErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entry: entry.into(),
            len,
            kind,
            message: message.into(),
        }
    }

    /// Truncated data is worth a re-fetch, everything else is fatal
    pub fn is_retryable(&self) -> bool {
        self.kind == DecodeErrorKind::Truncated
    }
}

/// Failure surfaced by `ComicPage` operations
#[derive(Debug, Clone, Error)]
pub enum PageError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The blocking worker panicked or was shut down
    #[error("background task for '{entry}' failed: {message}")]
    Worker { entry: String, message: String },

    #[error("thumbnail size must be at least 1 pixel")]
    InvalidThumbnailSize,
}

impl PageError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Decode(e) => e.is_retryable(),
            _ => false,
        }
    }

    pub fn decode_kind(&self) -> Option<DecodeErrorKind> {
        match self {
            Self::Decode(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Reason a pane layout cannot be used for a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("layout has no panes")]
    Empty,

    #[error("pane {index} has zero width or height")]
    EmptyPane { index: usize },

    #[error("pane {index} extends past the {width}x{height} page")]
    OutOfBounds { index: usize, width: u32, height: u32 },

    #[error("panes {first} and {second} overlap")]
    Overlap { first: usize, second: usize },
}

/// Configuration loading or validation failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
