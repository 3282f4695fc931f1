// THEORY:
// The `region` module turns a loose cloud of flagged pixel coordinates into a single
// rectangle an operator can look at. It is the localisation half of the pre-filter:
// the analyzer collects coordinates, this module summarises them.
//
// Key architectural principles:
// 1.  **Extremes, then padding**: the box is the min/max of the flagged coordinates,
//     grown by a fixed margin so a tiny defect still renders as a visible rectangle.
// 2.  **Always inside the image**: every edge is clamped, so a box reported for a
//     W x H frame always lies within [0, W) x [0, H).
// 3.  **Absence is a value**: no flagged pixels means `None`, never a zero-area box.

use serde::{Deserialize, Serialize};

/// Padding, in source pixels, added around the extreme flagged coordinates.
pub const BOUNDING_BOX_PADDING: u32 = 20;

/// A pixel coordinate in the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Padded, clamped box around `points` inside a `image_width` x `image_height`
    /// frame. Returns `None` for an empty point list or an empty frame.
    pub fn enclosing(
        points: &[Point],
        padding: u32,
        image_width: u32,
        image_height: u32,
    ) -> Option<Self> {
        if points.is_empty() || image_width == 0 || image_height == 0 {
            return None;
        }

        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        for point in points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        let left = min_x.saturating_sub(padding).min(image_width - 1);
        let top = min_y.saturating_sub(padding).min(image_height - 1);
        let right = max_x.saturating_add(padding).min(image_width - 1);
        let bottom = max_y.saturating_add(padding).min(image_height - 1);

        Some(Self {
            x: left,
            y: top,
            width: right - left + 1,
            height: bottom - top + 1,
        })
    }

    /// True when the box lies entirely within a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }
}
