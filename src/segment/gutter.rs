//! Gutter detection
//!
//! A gutter is a run of rows (or columns) whose luma is nearly flat across
//! the whole span of the region being examined. Runs that touch the region's
//! border are page margins and never split anything.

use image::{GrayImage, RgbaImage};

use crate::geometry::PaneRect;

/// Direction of a gutter band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal band; cutting along it separates top from bottom
    Rows,
    /// Vertical band; cutting along it separates left from right
    Columns,
}

/// A run of flat lines strictly inside a region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gutter {
    pub axis: Axis,
    /// First line of the run, in image coordinates
    pub start: u32,
    /// Number of lines in the run
    pub len: u32,
    /// Mean variance of the lines in the run
    pub mean_variance: f64,
}

impl Gutter {
    /// Line at which the region is cut (the middle of the band)
    pub fn split_line(&self) -> u32 {
        self.start + self.len / 2
    }

    /// Children produced by cutting `region` along this gutter
    pub fn split(&self, region: &PaneRect) -> (PaneRect, PaneRect) {
        let line = self.split_line();
        match self.axis {
            Axis::Rows => {
                let top = line - region.y;
                (
                    PaneRect::new(region.x, region.y, region.width, top),
                    PaneRect::new(region.x, line, region.width, region.height - top),
                )
            }
            Axis::Columns => {
                let left = line - region.x;
                (
                    PaneRect::new(region.x, region.y, left, region.height),
                    PaneRect::new(line, region.y, region.width - left, region.height),
                )
            }
        }
    }
}

/// Luma view of a page used for variance profiles
pub struct LumaPlane {
    gray: GrayImage,
}

impl LumaPlane {
    pub fn from_rgba(pixels: &RgbaImage) -> Self {
        Self {
            gray: image::imageops::grayscale(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.gray.width()
    }

    pub fn height(&self) -> u32 {
        self.gray.height()
    }

    fn row(&self, y: u32, x0: u32, x1: u32) -> &[u8] {
        let stride = self.gray.width() as usize;
        let start = y as usize * stride;
        &self.gray.as_raw()[start + x0 as usize..start + x1 as usize]
    }

    /// Per-line luma variance across the region, for every line of `axis`
    ///
    /// Rows yield `region.height` values, columns `region.width` values.
    pub fn line_variances(&self, region: &PaneRect, axis: Axis) -> Vec<f64> {
        let (x0, x1) = (region.x, region.x + region.width);
        let (y0, y1) = (region.y, region.y + region.height);

        match axis {
            Axis::Rows => (y0..y1)
                .map(|y| {
                    let mut acc = Moments::default();
                    for &v in self.row(y, x0, x1) {
                        acc.push(v);
                    }
                    acc.variance()
                })
                .collect(),
            Axis::Columns => {
                // Row-major walk, one accumulator per column
                let mut acc = vec![Moments::default(); region.width as usize];
                for y in y0..y1 {
                    for (slot, &v) in acc.iter_mut().zip(self.row(y, x0, x1)) {
                        slot.push(v);
                    }
                }
                acc.iter().map(Moments::variance).collect()
            }
        }
    }
}

/// Running sums for an exact integer variance
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    n: u64,
    sum: u64,
    sum_sq: u64,
}

impl Moments {
    fn push(&mut self, v: u8) {
        let v = u64::from(v);
        self.n += 1;
        self.sum += v;
        self.sum_sq += v * v;
    }

    fn variance(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        // n * sum_sq - sum^2 is exact in u128 and never negative
        let n = u128::from(self.n);
        let sum = u128::from(self.sum);
        let numerator = n * u128::from(self.sum_sq) - sum * sum;
        numerator as f64 / (n * n) as f64
    }
}

/// Find gutter bands in a variance profile
///
/// # Arguments
/// * `variances` - One value per line, as returned by `line_variances`
/// * `origin` - Image coordinate of the first line
/// * `axis` - Axis the profile was computed for
/// * `threshold` - Largest variance of a flat line
/// * `min_thickness` - Shortest run accepted
///
/// # Returns
/// * Runs that do not touch either end of the profile, in position order
pub fn find_gutters(
    variances: &[f64],
    origin: u32,
    axis: Axis,
    threshold: f64,
    min_thickness: u32,
) -> Vec<Gutter> {
    let mut gutters = Vec::new();
    let mut i = 0;
    while i < variances.len() {
        if variances[i] > threshold {
            i += 1;
            continue;
        }

        let start = i;
        let mut total = 0.0;
        while i < variances.len() && variances[i] <= threshold {
            total += variances[i];
            i += 1;
        }
        let len = i - start;

        let touches_edge = start == 0 || i == variances.len();
        if touches_edge || (len as u32) < min_thickness {
            continue;
        }

        gutters.push(Gutter {
            axis,
            start: origin + start as u32,
            len: len as u32,
            mean_variance: total / len as f64,
        });
    }
    gutters
}
