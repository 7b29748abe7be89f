//! Reading order of panes
//!
//! Panes are read top to bottom; panes starting on the same line are read
//! left to right (`Ltr`) or right to left (`Rtl`). The order drives
//! next/previous pane navigation and the shared-edge rule of hit testing.

use std::cmp::Ordering;

use crate::config::ReadingDirection;
use crate::geometry::PaneRect;

/// Compare two panes by reading order
pub fn reading_order(a: &PaneRect, b: &PaneRect, direction: ReadingDirection) -> Ordering {
    let secondary = match direction {
        ReadingDirection::Ltr => a.x.cmp(&b.x),
        ReadingDirection::Rtl => b.right().cmp(&a.right()),
    };
    a.y.cmp(&b.y)
        .then(secondary)
        .then(a.height.cmp(&b.height))
        .then(a.width.cmp(&b.width))
}

/// Sort panes into reading order
pub fn sort_reading_order(panes: &mut [PaneRect], direction: ReadingDirection) {
    panes.sort_by(|a, b| reading_order(a, b, direction));
}
