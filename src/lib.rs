//! Comic pages with lazy decoding, automatic pane segmentation and tap
//! hit-testing.
//!
//! ```no_run
//! use std::sync::Arc;
//! use comic_page::{ComicPage, MemoryArchive, PaneLookup, Point};
//!
//! # async fn run(bytes: Vec<u8>) -> Result<(), comic_page::PageError> {
//! let archive = Arc::new(MemoryArchive::new());
//! let entry = archive.insert("p001.png", bytes);
//! let page = ComicPage::shared(entry, archive);
//!
//! let panes = page.panes().await?;
//! if let PaneLookup::Hit { index, .. } = page.pane_at_point(Point::new(10.0, 10.0)) {
//!     println!("tapped pane {index} of {}", panes.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod decode;
pub mod error;
pub mod geometry;
pub mod page;
pub mod photo;
pub mod segment;

pub use archive::{ArchiveEntryRef, ArchiveEntrySource, DirectoryArchive, EntryId, MemoryArchive};
pub use config::{ReaderConfig, ReadingDirection, SegmenterConfig};
pub use decode::{DecodedImage, ImageCrateDecoder, ImageDecoder};
pub use error::{ArchiveError, ConfigError, DecodeError, DecodeErrorKind, LayoutError, PageError};
pub use geometry::{PaneRect, Point};
pub use page::{ComicPage, PageState, PaneLookup};
pub use photo::{Photo, PhotoDisplayAdapter, PhotoLoadState};
pub use segment::{GutterSegmenter, PageLayout, PaneSegmenter, Segmentation, SegmentationOutcome};
