//! Recursive gutter splitting
//!
//! The page is cut along its strongest interior gutter, then each half is
//! examined again with variances recomputed over its own span, until no
//! admissible gutter remains. Cuts go through the middle of a gutter so the
//! resulting panes tile the page: every point of the page is in some pane.

use std::cmp::Ordering;

use tracing::{debug, warn};

use super::gutter::{find_gutters, Axis, Gutter, LumaPlane};
use super::layout::PageLayout;
use super::order::sort_reading_order;
use super::{PaneSegmenter, Segmentation, SegmentationOutcome};
use crate::config::SegmenterConfig;
use crate::decode::DecodedImage;
use crate::geometry::PaneRect;

/// A gutter chosen for a cut, with the balance of the split it produces
#[derive(Debug, Clone, Copy)]
struct Cut {
    gutter: Gutter,
    /// Smaller child area over larger child area, in (0, 1]
    balance: f64,
}

/// Default segmenter: gutter detection with layout override
#[derive(Debug, Clone, Default)]
pub struct GutterSegmenter {
    config: SegmenterConfig,
}

impl GutterSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segment by gutters only, ignoring any layout
    pub fn segment_gutters(&self, image: &DecodedImage) -> Segmentation {
        let (width, height) = image.dimensions();
        let plane = LumaPlane::from_rgba(image.pixels());
        let min_area = self.min_region_area(width, height);

        let mut panes = Vec::new();
        let splits = self.partition(&plane, PaneRect::full(width, height), min_area, &mut panes);

        if splits == 0 {
            debug!(width, height, "no gutters found, using whole page");
            return Segmentation::whole_page(width, height);
        }

        sort_reading_order(&mut panes, self.config.reading_direction);
        debug!(width, height, panes = panes.len(), splits, "segmented page");
        Segmentation::new(panes, SegmentationOutcome::Gutters { splits })
    }

    fn min_region_area(&self, width: u32, height: u32) -> u64 {
        let page = u64::from(width) * u64::from(height);
        let area = (self.config.min_region_area_fraction * page as f64).ceil() as u64;
        area.max(1)
    }

    /// Cut `region` recursively, pushing leaves into `panes`
    ///
    /// Returns the number of cuts made.
    fn partition(
        &self,
        plane: &LumaPlane,
        region: PaneRect,
        min_area: u64,
        panes: &mut Vec<PaneRect>,
    ) -> usize {
        match self.best_cut(plane, &region, min_area) {
            Some(cut) => {
                let (first, second) = cut.gutter.split(&region);
                1 + self.partition(plane, first, min_area, panes)
                    + self.partition(plane, second, min_area, panes)
            }
            None => {
                panes.push(region);
                0
            }
        }
    }

    /// Pick the cut for a region, if any gutter is admissible
    ///
    /// Within an axis the thickest gutter wins; between axes the more
    /// balanced split wins, and horizontal cuts win exact ties.
    fn best_cut(&self, plane: &LumaPlane, region: &PaneRect, min_area: u64) -> Option<Cut> {
        if region.area() < min_area.saturating_mul(2) {
            return None;
        }

        let rows = self.best_cut_on_axis(plane, region, Axis::Rows, min_area);
        let columns = self.best_cut_on_axis(plane, region, Axis::Columns, min_area);

        match (rows, columns) {
            (Some(r), Some(c)) => {
                if c.balance.total_cmp(&r.balance) == Ordering::Greater {
                    Some(c)
                } else {
                    Some(r)
                }
            }
            (r, c) => r.or(c),
        }
    }

    fn best_cut_on_axis(
        &self,
        plane: &LumaPlane,
        region: &PaneRect,
        axis: Axis,
        min_area: u64,
    ) -> Option<Cut> {
        let (origin, span) = match axis {
            Axis::Rows => (region.y, region.height),
            Axis::Columns => (region.x, region.width),
        };
        if span < 3 {
            return None;
        }

        let variances = plane.line_variances(region, axis);
        find_gutters(
            &variances,
            origin,
            axis,
            self.config.gutter_variance_threshold,
            self.config.min_gutter_thickness,
        )
        .into_iter()
        .filter_map(|gutter| {
            let (a, b) = gutter.split(region);
            let (small, large) = if a.area() <= b.area() {
                (a.area(), b.area())
            } else {
                (b.area(), a.area())
            };
            (small >= min_area).then(|| Cut {
                gutter,
                balance: small as f64 / large as f64,
            })
        })
        .reduce(|best, next| if stronger(&next, &best) { next } else { best })
    }
}

/// Strength order of two candidate cuts on the same axis
///
/// Thicker first, then more balanced, then flatter; `reduce` keeps the
/// earliest gutter when everything ties.
fn stronger(a: &Cut, b: &Cut) -> bool {
    let order = a
        .gutter
        .len
        .cmp(&b.gutter.len)
        .then(a.balance.total_cmp(&b.balance))
        .then(b.gutter.mean_variance.total_cmp(&a.gutter.mean_variance));
    order == Ordering::Greater
}

impl PaneSegmenter for GutterSegmenter {
    fn segment(&self, image: &DecodedImage, layout: Option<&PageLayout>) -> Segmentation {
        if let Some(layout) = layout {
            let (width, height) = image.dimensions();
            match layout.validate(width, height) {
                Ok(()) => {
                    let mut panes = layout.panes.clone();
                    sort_reading_order(&mut panes, self.config.reading_direction);
                    debug!(panes = panes.len(), "using pane layout metadata");
                    return Segmentation::new(panes, SegmentationOutcome::Layout);
                }
                Err(e) => warn!(error = %e, "ignoring invalid pane layout"),
            }
        }
        self.segment_gutters(image)
    }
}
