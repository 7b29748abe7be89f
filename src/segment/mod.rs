/// Pane segmentation module
///
/// This module handles:
/// - Detecting gutters between panels (gutter.rs)
/// - Recursively cutting the page along them (splitter.rs)
/// - Pane layouts supplied by the page source (layout.rs)
/// - Sorting panes into reading order (order.rs)
pub mod gutter;
pub mod layout;
pub mod order;
pub mod splitter;

use std::sync::Arc;

use crate::decode::DecodedImage;
use crate::error::PageError;
use crate::geometry::{PaneRect, Point};

pub use layout::PageLayout;
pub use splitter::GutterSegmenter;

/// How a page's panes were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentationOutcome {
    /// Gutter detection split the page `splits` times
    Gutters { splits: usize },
    /// Panes came from layout metadata
    Layout,
    /// No gutter qualified; the whole page is one pane
    Fallback,
}

/// Panes of one page, in reading order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    panes: Arc<[PaneRect]>,
    outcome: SegmentationOutcome,
}

impl Segmentation {
    pub fn new(panes: Vec<PaneRect>, outcome: SegmentationOutcome) -> Self {
        Self {
            panes: panes.into(),
            outcome,
        }
    }

    /// Single pane covering the whole page
    pub fn whole_page(width: u32, height: u32) -> Self {
        Self::new(vec![PaneRect::full(width, height)], SegmentationOutcome::Fallback)
    }

    pub fn panes(&self) -> &Arc<[PaneRect]> {
        &self.panes
    }

    pub fn outcome(&self) -> SegmentationOutcome {
        self.outcome
    }

    /// True when no gutters were found and the fallback pane is in use
    pub fn is_degraded(&self) -> bool {
        self.outcome == SegmentationOutcome::Fallback
    }

    /// First pane in reading order containing `point` (edges inclusive)
    pub fn pane_at(&self, point: Point) -> Option<(usize, PaneRect)> {
        self.panes
            .iter()
            .enumerate()
            .find(|(_, pane)| pane.contains(point))
            .map(|(index, pane)| (index, *pane))
    }
}

/// Computes the panes of a decoded page
///
/// Segmentation cannot fail: when nothing better is found the whole page is
/// returned as a single pane. Output must depend only on the pixels, the
/// layout and the segmenter's own configuration.
pub trait PaneSegmenter: Send + Sync {
    fn segment(&self, image: &DecodedImage, layout: Option<&PageLayout>) -> Segmentation;
}

/// Run a segmenter on the blocking pool
pub async fn segment_off_thread(
    segmenter: Arc<dyn PaneSegmenter>,
    image: Arc<DecodedImage>,
    layout: Option<PageLayout>,
    entry: &str,
) -> Result<Segmentation, PageError> {
    // Spawn blocking because the variance scans touch every pixel
    tokio::task::spawn_blocking(move || segmenter.segment(&image, layout.as_ref()))
        .await
        .map_err(|e| PageError::Worker {
            entry: entry.to_string(),
            message: format!("segmentation task join error: {e}"),
        })
}
