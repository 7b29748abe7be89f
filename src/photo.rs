//! Photo viewer protocol
//!
//! Generic photo browsers ask each item for a full image, a thumbnail and a
//! caption, and poll a load state to show spinners or error badges.
//! `PhotoDisplayAdapter` answers those questions for a `ComicPage` without
//! keeping any state of its own.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{ReaderConfig, DEFAULT_THUMBNAIL_SIZE};
use crate::decode::DecodedImage;
use crate::error::PageError;
use crate::page::{ComicPage, PageState};

/// Load state as a photo viewer understands it
#[derive(Debug, Clone)]
pub enum PhotoLoadState {
    /// Not loaded; the viewer should request the image
    Idle,
    /// Show a progress indicator
    Loading,
    /// Image available
    Loaded,
    /// Show the generic "failed to load" placeholder
    Failed(PageError),
}

impl PhotoLoadState {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// What a photo viewer needs from each item it shows
#[async_trait]
pub trait Photo: Send + Sync {
    /// Text shown under the photo
    fn caption(&self) -> Option<String>;

    fn load_state(&self) -> PhotoLoadState;

    /// Full-resolution image, loading it if needed
    async fn underlying_image(&self) -> Result<Arc<DecodedImage>, PageError>;

    /// Small version for grids and filmstrips
    async fn thumbnail_image(&self) -> Result<DecodedImage, PageError>;

    /// Release the full-resolution image (the viewer moved away)
    fn unload_underlying_image(&self);
}

/// Presents a `ComicPage` through the `Photo` protocol
#[derive(Debug, Clone)]
pub struct PhotoDisplayAdapter {
    page: Arc<ComicPage>,
    thumbnail_max_dimension: u32,
}

impl PhotoDisplayAdapter {
    pub fn new(page: Arc<ComicPage>) -> Self {
        Self {
            page,
            thumbnail_max_dimension: DEFAULT_THUMBNAIL_SIZE,
        }
    }

    pub fn with_config(page: Arc<ComicPage>, config: &ReaderConfig) -> Self {
        Self {
            page,
            thumbnail_max_dimension: config.thumbnail_max_dimension,
        }
    }

    pub fn page(&self) -> &Arc<ComicPage> {
        &self.page
    }
}

/// Caption for an entry: its file name without directories or extension
///
/// # Examples
/// * `"vol1/ch02/p003.jpg"` -> `"p003"`
/// * `".jpg"` -> `".jpg"`
pub fn caption_for(entry_name: &str) -> Option<String> {
    let file = entry_name.rsplit(['/', '\\']).next().unwrap_or(entry_name);
    let stem = Path::new(file).file_stem()?.to_string_lossy();
    let stem = stem.trim();
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

#[async_trait]
impl Photo for PhotoDisplayAdapter {
    fn caption(&self) -> Option<String> {
        caption_for(&self.page.entry().name)
    }

    fn load_state(&self) -> PhotoLoadState {
        match self.page.state() {
            PageState::Unloaded => PhotoLoadState::Idle,
            PageState::Loading => PhotoLoadState::Loading,
            PageState::Ready => PhotoLoadState::Loaded,
            PageState::Failed(e) => PhotoLoadState::Failed(e),
        }
    }

    async fn underlying_image(&self) -> Result<Arc<DecodedImage>, PageError> {
        self.page.image().await
    }

    async fn thumbnail_image(&self) -> Result<DecodedImage, PageError> {
        self.page.thumbnail(self.thumbnail_max_dimension).await
    }

    fn unload_underlying_image(&self) {
        self.page.purge_image();
    }
}
