//! Comic page module
//!
//! A `ComicPage` wraps one archive entry and lazily produces:
//! - the decoded page image (dropped and re-decoded on memory pressure)
//! - the pane list in reading order (computed once, kept across purges)
//! - hit tests mapping a tap point to a pane

pub mod slot;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive::{ArchiveEntryRef, ArchiveEntrySource};
use crate::config::ReaderConfig;
use crate::decode::decoder::decode_off_thread;
use crate::decode::thumbnail::thumbnail_off_thread;
use crate::decode::{DecodedImage, ImageCrateDecoder, ImageDecoder};
use crate::error::PageError;
use crate::geometry::{PaneRect, Point};
use crate::segment::{
    segment_off_thread, GutterSegmenter, PageLayout, PaneSegmenter, Segmentation,
};

use slot::{Slot, SlotState};

/// Load state of a page's image
#[derive(Debug, Clone)]
pub enum PageState {
    /// Nothing decoded yet (or purged)
    Unloaded,
    /// Fetch or decode in progress
    Loading,
    /// Image available
    Ready,
    /// Fetch or decode failed; repeated until `invalidate`
    Failed(PageError),
}

/// Result of a hit test
#[derive(Debug, Clone)]
pub enum PaneLookup {
    /// The point lies in this pane (index in reading order)
    Hit { index: usize, rect: PaneRect },
    /// The point is outside every pane
    Miss,
    /// Panes have not been computed yet; call `panes()` first
    NotReady,
    /// Computing the panes failed
    Failed(PageError),
}

impl PaneLookup {
    pub fn rect(&self) -> Option<PaneRect> {
        match self {
            Self::Hit { rect, .. } => Some(*rect),
            _ => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Hit { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// One page of a comic
///
/// Construction does no I/O. The first call to `image`, `thumbnail` or
/// `panes` fetches and decodes the entry; segmentation runs on the first
/// call to `panes`. Both happen at most once per page until `invalidate`,
/// even when many tasks ask at the same time.
pub struct ComicPage {
    entry: ArchiveEntryRef,
    source: Arc<dyn ArchiveEntrySource>,
    decoder: Arc<dyn ImageDecoder>,
    segmenter: Arc<dyn PaneSegmenter>,
    image: Slot<Arc<DecodedImage>>,
    segmentation: Slot<Arc<Segmentation>>,
}

impl ComicPage {
    /// Create a page with the default decoder and segmenter
    pub fn new(entry: ArchiveEntryRef, source: Arc<dyn ArchiveEntrySource>) -> Self {
        Self::with_config(entry, source, &ReaderConfig::default())
    }

    /// Create a page whose segmenter follows `config`
    pub fn with_config(
        entry: ArchiveEntryRef,
        source: Arc<dyn ArchiveEntrySource>,
        config: &ReaderConfig,
    ) -> Self {
        Self::with_pipeline(
            entry,
            source,
            Arc::new(ImageCrateDecoder::new()),
            Arc::new(GutterSegmenter::new(config.segmenter)),
        )
    }

    /// Create a page with custom decode and segmentation stages
    pub fn with_pipeline(
        entry: ArchiveEntryRef,
        source: Arc<dyn ArchiveEntrySource>,
        decoder: Arc<dyn ImageDecoder>,
        segmenter: Arc<dyn PaneSegmenter>,
    ) -> Self {
        Self {
            entry,
            source,
            decoder,
            segmenter,
            image: Slot::new(),
            segmentation: Slot::new(),
        }
    }

    /// Create a shareable page with default settings
    pub fn shared(entry: ArchiveEntryRef, source: Arc<dyn ArchiveEntrySource>) -> Arc<Self> {
        Arc::new(Self::new(entry, source))
    }

    pub fn entry(&self) -> &ArchiveEntryRef {
        &self.entry
    }

    /// Full-size page image
    ///
    /// Decodes on first use. A failure is cached and returned again on every
    /// call until `invalidate`.
    pub async fn image(&self) -> Result<Arc<DecodedImage>, PageError> {
        self.image.get_or_init(|| self.load_image()).await
    }

    async fn load_image(&self) -> Result<Arc<DecodedImage>, PageError> {
        let data = self.source.fetch_bytes(&self.entry.id).await?;
        debug!(entry = %self.entry.name, len = data.len(), "fetched page bytes");

        let image = decode_off_thread(self.decoder.clone(), self.entry.clone(), data).await?;
        Ok(Arc::new(image))
    }

    /// Page image scaled so neither side exceeds `max_dimension`
    pub async fn thumbnail(&self, max_dimension: u32) -> Result<DecodedImage, PageError> {
        if max_dimension == 0 {
            return Err(PageError::InvalidThumbnailSize);
        }
        let image = self.image().await?;
        thumbnail_off_thread(image, max_dimension, &self.entry.name).await
    }

    /// Panes in reading order
    pub async fn panes(&self) -> Result<Arc<[PaneRect]>, PageError> {
        Ok(self.segmentation().await?.panes().clone())
    }

    /// Panes together with how they were obtained
    pub async fn segmentation(&self) -> Result<Arc<Segmentation>, PageError> {
        self.segmentation
            .get_or_init(|| self.compute_segmentation())
            .await
    }

    async fn compute_segmentation(&self) -> Result<Arc<Segmentation>, PageError> {
        let image = self.image().await?;
        let layout = self.load_layout().await;

        let segmentation =
            segment_off_thread(self.segmenter.clone(), image, layout, &self.entry.name).await?;

        info!(
            entry = %self.entry.name,
            panes = segmentation.panes().len(),
            outcome = ?segmentation.outcome(),
            "page segmented"
        );
        Ok(Arc::new(segmentation))
    }

    /// Layout metadata from the source, if any
    ///
    /// Layouts are optional: unreadable or unparsable ones are logged and
    /// gutter detection is used instead.
    async fn load_layout(&self) -> Option<PageLayout> {
        let bytes = match self.source.fetch_layout(&self.entry.id).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(entry = %self.entry.name, error = %e, "failed to read pane layout");
                return None;
            }
        };

        match PageLayout::from_json(&bytes) {
            Ok(layout) => Some(layout),
            Err(e) => {
                warn!(entry = %self.entry.name, error = %e, "failed to parse pane layout");
                None
            }
        }
    }

    /// Cached panes, if segmentation has completed successfully
    pub fn pane_rects(&self) -> Option<Arc<[PaneRect]>> {
        match self.segmentation.peek() {
            Some(Ok(segmentation)) => Some(segmentation.panes().clone()),
            _ => None,
        }
    }

    /// Find the pane under a tap point
    ///
    /// Never decodes or waits. Edges are inclusive; a point on an edge shared
    /// by two panes belongs to the one earlier in reading order.
    pub fn pane_at_point(&self, point: Point) -> PaneLookup {
        match self.segmentation.peek() {
            None => PaneLookup::NotReady,
            Some(Err(e)) => PaneLookup::Failed(e),
            Some(Ok(segmentation)) => match segmentation.pane_at(point) {
                Some((index, rect)) => PaneLookup::Hit { index, rect },
                None => PaneLookup::Miss,
            },
        }
    }

    /// Load state of the page image
    pub fn state(&self) -> PageState {
        match self.image.state() {
            SlotState::Unloaded => PageState::Unloaded,
            SlotState::Loading => PageState::Loading,
            SlotState::Ready(_) => PageState::Ready,
            SlotState::Failed(e) => PageState::Failed(e),
        }
    }

    /// Drop the decoded pixels to free memory
    ///
    /// Panes stay cached. The next `image` call decodes again. Cached
    /// failures are kept.
    pub fn purge_image(&self) {
        if self.image.reset_ready() {
            debug!(entry = %self.entry.name, "purged page image");
        }
    }

    /// Forget everything cached, including failures
    ///
    /// The next access fetches, decodes and segments again. Segmentation is
    /// deterministic, so panes only change if the entry's bytes did.
    pub fn invalidate(&self) {
        self.image.reset();
        self.segmentation.reset();
        debug!(entry = %self.entry.name, "invalidated page");
    }
}

impl fmt::Debug for ComicPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComicPage")
            .field("entry", &self.entry)
            .field("state", &self.state())
            .field("panes", &self.pane_rects().map(|p| p.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;
    use crate::decode::decoder::tests::encode;
    use crate::error::{ArchiveError, DecodeError, DecodeErrorKind};
    use crate::segment::splitter::tests::{page_with_row_gutters, three_tier_page};
    use crate::segment::SegmentationOutcome;
    use image::ImageFormat;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Decoder that ignores the bytes and returns a fixed image
    struct FixedDecoder {
        image: DecodedImage,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl FixedDecoder {
        fn new(image: DecodedImage) -> Arc<Self> {
            Self::slow(image, Duration::ZERO)
        }

        fn slow(image: DecodedImage, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                image,
                calls: AtomicUsize::new(0),
                delay,
            })
        }
    }

    impl ImageDecoder for FixedDecoder {
        fn decode(&self, _: &ArchiveEntryRef, _: &[u8]) -> Result<DecodedImage, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Ok(self.image.clone())
        }
    }

    /// Wraps another decoder and counts calls
    struct CountingDecoder {
        inner: ImageCrateDecoder,
        calls: AtomicUsize,
    }

    impl ImageDecoder for CountingDecoder {
        fn decode(&self, entry: &ArchiveEntryRef, data: &[u8]) -> Result<DecodedImage, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.decode(entry, data)
        }
    }

    #[derive(Default)]
    struct CountingSegmenter {
        inner: GutterSegmenter,
        calls: AtomicUsize,
    }

    impl PaneSegmenter for CountingSegmenter {
        fn segment(&self, image: &DecodedImage, layout: Option<&PageLayout>) -> Segmentation {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.segment(image, layout)
        }
    }

    fn three_tier(
        archive: &Arc<MemoryArchive>,
    ) -> (ComicPage, Arc<FixedDecoder>, Arc<CountingSegmenter>) {
        let entry = archive.insert("ch01/p001.png", vec![0u8; 16]);
        let decoder = FixedDecoder::new(three_tier_page());
        let segmenter = Arc::new(CountingSegmenter::default());
        let page = ComicPage::with_pipeline(
            entry,
            archive.clone(),
            decoder.clone(),
            segmenter.clone(),
        );
        (page, decoder, segmenter)
    }

    #[tokio::test]
    async fn test_three_tier_scenario() {
        let archive = Arc::new(MemoryArchive::new());
        let (page, _, _) = three_tier(&archive);

        let panes = page.panes().await.unwrap();
        assert_eq!(panes.len(), 3);
        assert!(panes.iter().all(|p| p.x == 0 && p.width == 1000));

        assert_eq!(page.pane_at_point(Point::new(500.0, 100.0)).index(), Some(0));
        assert_eq!(page.pane_at_point(Point::new(500.0, 510.0)).index(), Some(0));
        assert_eq!(page.pane_at_point(Point::new(500.0, 540.0)).index(), Some(1));
        assert_eq!(page.pane_at_point(Point::new(500.0, 1300.0)).index(), Some(2));
        assert_eq!(
            page.pane_at_point(Point::new(500.0, 1300.0)).rect(),
            Some(PaneRect::new(0, 1050, 1000, 550))
        );
    }

    #[tokio::test]
    async fn test_points_inside_always_hit_and_outside_miss() {
        let archive = Arc::new(MemoryArchive::new());
        let (page, _, _) = three_tier(&archive);
        page.panes().await.unwrap();

        for y in (0..=1600).step_by(37) {
            for x in (0..=1000).step_by(53) {
                let lookup = page.pane_at_point(Point::new(f64::from(x), f64::from(y)));
                assert!(matches!(lookup, PaneLookup::Hit { .. }), "({x}, {y})");
            }
        }
        for point in [(-1.0, 10.0), (10.0, 1600.5), (1000.1, 0.0), (f64::NAN, 1.0)] {
            let lookup = page.pane_at_point(Point::new(point.0, point.1));
            assert!(matches!(lookup, PaneLookup::Miss), "{point:?}");
        }
    }

    #[tokio::test]
    async fn test_compute_once() {
        let archive = Arc::new(MemoryArchive::new());
        let (page, decoder, segmenter) = three_tier(&archive);

        assert!(matches!(page.pane_at_point(Point::new(1.0, 1.0)), PaneLookup::NotReady));
        assert!(page.pane_rects().is_none());
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);

        for _ in 0..3 {
            page.image().await.unwrap();
            page.panes().await.unwrap();
            page.pane_at_point(Point::new(1.0, 1.0));
        }
        page.thumbnail(64).await.unwrap();

        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(page.pane_rects().map(|p| p.len()), Some(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access() {
        let archive = Arc::new(MemoryArchive::new());
        let (page, decoder, segmenter) = three_tier(&archive);
        let page = Arc::new(page);

        let tasks = (0..12).map(|i| {
            let page = page.clone();
            tokio::spawn(async move {
                if i % 3 == 0 {
                    page.image().await.unwrap();
                }
                page.panes().await.unwrap()
            })
        });
        let results: Vec<Arc<[PaneRect]>> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|panes| panes[..] == results[0][..]));
    }

    #[tokio::test]
    async fn test_truncated_bytes_fail_stickily() {
        let pixels = page_with_row_gutters(60, 90, &[(40, 45)]).into_pixels();
        let png = encode(&pixels, ImageFormat::Png);
        let archive = Arc::new(MemoryArchive::new());
        let entry = archive.insert("p007.png", png[..png.len() / 3].to_vec());

        let decoder = Arc::new(CountingDecoder {
            inner: ImageCrateDecoder,
            calls: AtomicUsize::new(0),
        });
        let segmenter = Arc::new(CountingSegmenter::default());
        let page = ComicPage::with_pipeline(
            entry.clone(),
            archive.clone(),
            decoder.clone(),
            segmenter.clone(),
        );

        let first = page.image().await.unwrap_err();
        let second = page.image().await.unwrap_err();
        assert_eq!(first.decode_kind(), Some(DecodeErrorKind::Truncated));
        assert_eq!(first.to_string(), second.to_string());
        assert!(first.is_retryable());
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);

        let panes_err = page.panes().await.unwrap_err();
        assert_eq!(panes_err.to_string(), first.to_string());
        assert!(matches!(page.state(), PageState::Failed(_)));
        assert!(matches!(page.pane_at_point(Point::new(1.0, 1.0)), PaneLookup::Failed(_)));
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 0);

        // Caller re-fetches and retries explicitly
        archive.replace(&entry.id, png.clone()).unwrap();
        assert!(page.image().await.is_err());
        page.invalidate();
        let panes = page.panes().await.unwrap();
        assert_eq!(&panes[..], &[PaneRect::new(0, 0, 60, 43), PaneRect::new(0, 43, 60, 47)]);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_entry_is_archive_error() {
        let archive = Arc::new(MemoryArchive::new());
        let entry = archive.insert("gone.png", vec![1u8]);
        archive.remove(&entry.id);

        let page = ComicPage::new(entry, archive);
        let err = page.panes().await.unwrap_err();
        assert!(matches!(err, PageError::Archive(ArchiveError::NotFound { .. })));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_purge_keeps_panes() {
        let archive = Arc::new(MemoryArchive::new());
        let (page, decoder, segmenter) = three_tier(&archive);

        let before = page.panes().await.unwrap();
        assert!(matches!(page.state(), PageState::Ready));

        page.purge_image();
        assert!(matches!(page.state(), PageState::Unloaded));
        assert_eq!(page.pane_at_point(Point::new(500.0, 1300.0)).index(), Some(2));
        assert_eq!(&page.panes().await.unwrap()[..], &before[..]);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);

        page.image().await.unwrap();
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_recomputes_same_panes() {
        let archive = Arc::new(MemoryArchive::new());
        let (page, decoder, segmenter) = three_tier(&archive);

        let before = page.panes().await.unwrap();
        page.invalidate();
        assert!(matches!(page.pane_at_point(Point::new(1.0, 1.0)), PaneLookup::NotReady));

        let after = page.panes().await.unwrap();
        assert_eq!(&before[..], &after[..]);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(segmenter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_load_does_not_poison_page() {
        let archive = Arc::new(MemoryArchive::new());
        let entry = archive.insert("slow.png", vec![0u8]);
        let decoder = FixedDecoder::slow(three_tier_page(), Duration::from_millis(200));
        let page = Arc::new(ComicPage::with_pipeline(
            entry,
            archive,
            decoder.clone(),
            Arc::new(GutterSegmenter::default()),
        ));

        let abandoned = {
            let page = page.clone();
            tokio::spawn(async move { page.panes().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(page.state(), PageState::Loading));
        abandoned.abort();
        let _ = abandoned.await;

        assert_eq!(page.panes().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_layout_metadata_from_source() {
        let archive = Arc::new(MemoryArchive::new());
        let (page, _, _) = three_tier(&archive);
        archive.insert_layout(
            &page.entry().id,
            r#"{"panes": [{"x": 0, "y": 0, "width": 1000, "height": 1600}]}"#,
        );

        let segmentation = page.segmentation().await.unwrap();
        assert_eq!(segmentation.outcome(), SegmentationOutcome::Layout);
        assert_eq!(&segmentation.panes()[..], &[PaneRect::full(1000, 1600)]);
    }

    #[tokio::test]
    async fn test_unparsable_layout_is_ignored() {
        let archive = Arc::new(MemoryArchive::new());
        let (page, _, _) = three_tier(&archive);
        archive.insert_layout(&page.entry().id, "{ not json");

        let segmentation = page.segmentation().await.unwrap();
        assert_eq!(segmentation.outcome(), SegmentationOutcome::Gutters { splits: 2 });
    }

    #[tokio::test]
    async fn test_thumbnail() {
        let archive = Arc::new(MemoryArchive::new());
        let (page, _, _) = three_tier(&archive);

        assert!(matches!(page.thumbnail(0).await, Err(PageError::InvalidThumbnailSize)));
        let thumb = page.thumbnail(160).await.unwrap();
        assert_eq!(thumb.dimensions(), (100, 160));
    }

    #[tokio::test]
    async fn test_decodes_real_png_end_to_end() {
        let pixels = page_with_row_gutters(80, 120, &[(55, 64)]).into_pixels();
        let png = encode(&pixels, ImageFormat::Png);
        let archive = Arc::new(MemoryArchive::new());
        let entry = archive.insert("p1.png", png);

        let page = ComicPage::shared(entry, archive);
        let image = page.image().await.unwrap();
        assert_eq!(image.dimensions(), (80, 120));

        let panes = page.panes().await.unwrap();
        assert_eq!(&panes[..], &[PaneRect::new(0, 0, 80, 60), PaneRect::new(0, 60, 80, 60)]);
    }
}
