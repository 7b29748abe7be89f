//! Pane layout metadata
//!
//! Some sources ship hand-made pane rectangles next to a page (for example a
//! `<page>.panes.json` sidecar). When present and valid they replace gutter
//! detection.

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::geometry::PaneRect;

/// Pane rectangles supplied by the page source
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PageLayout {
    pub panes: Vec<PaneRect>,
}

impl PageLayout {
    pub fn new(panes: Vec<PaneRect>) -> Self {
        Self { panes }
    }

    /// Convert to JSON string for storage next to a page
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON bytes
    pub fn from_json(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }

    /// Check the layout against a `width` x `height` page
    ///
    /// Every pane must be non-empty, inside the page and must not overlap
    /// another pane (shared edges are fine).
    pub fn validate(&self, width: u32, height: u32) -> Result<(), LayoutError> {
        if self.panes.is_empty() {
            return Err(LayoutError::Empty);
        }

        for (index, pane) in self.panes.iter().enumerate() {
            if pane.is_empty() {
                return Err(LayoutError::EmptyPane { index });
            }
            if !pane.fits_within(width, height) {
                return Err(LayoutError::OutOfBounds { index, width, height });
            }
        }

        for (first, a) in self.panes.iter().enumerate() {
            for (offset, b) in self.panes[first + 1..].iter().enumerate() {
                if a.overlaps(b) {
                    return Err(LayoutError::Overlap {
                        first,
                        second: first + 1 + offset,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sidecar() {
        let json = br#"{"panes": [
            {"x": 0, "y": 0, "width": 100, "height": 50},
            {"x": 0, "y": 50, "width": 100, "height": 50}
        ]}"#;
        let layout = PageLayout::from_json(json).unwrap();
        assert_eq!(layout.panes.len(), 2);
        assert_eq!(layout.panes[1], PaneRect::new(0, 50, 100, 50));
        assert_eq!(layout.validate(100, 100), Ok(()));

        let restored = PageLayout::from_json(layout.to_json().unwrap().as_bytes()).unwrap();
        assert_eq!(restored, layout);
    }

    #[test]
    fn test_rejects_bad_layouts() {
        assert_eq!(PageLayout::default().validate(10, 10), Err(LayoutError::Empty));

        let empty_pane = PageLayout::new(vec![PaneRect::new(0, 0, 0, 5)]);
        assert_eq!(empty_pane.validate(10, 10), Err(LayoutError::EmptyPane { index: 0 }));

        let outside = PageLayout::new(vec![PaneRect::new(0, 0, 5, 5), PaneRect::new(6, 6, 5, 5)]);
        assert_eq!(
            outside.validate(10, 10),
            Err(LayoutError::OutOfBounds { index: 1, width: 10, height: 10 })
        );

        let overlapping = PageLayout::new(vec![
            PaneRect::new(0, 0, 5, 10),
            PaneRect::new(5, 0, 5, 5),
            PaneRect::new(4, 6, 6, 4),
        ]);
        assert_eq!(
            overlapping.validate(10, 10),
            Err(LayoutError::Overlap { first: 0, second: 2 })
        );
    }
}
