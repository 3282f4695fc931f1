// THEORY:
// The `PixelFeatureAnalyzer` makes one cheap pass over a full-resolution frame and
// reports coarse global statistics. It is not a detector: the coordinates of dark
// and color-irregular pixels are reduced to padded bounding boxes, which the
// decision engine attaches to a detected defect. The statistics never decide
// whether a category is compared; that depends only on registered references.
//
// Sampling every second pixel in each axis bounds the cost on large frames while
// still catching spots a few pixels wide.

use crate::core_modules::defect::RegionClass;
use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::core_modules::region::{BOUNDING_BOX_PADDING, BoundingBox, Point};

/// Sampling stride along each axis.
pub const SAMPLE_STRIDE: u32 = 2;
/// Channel-mean brightness below which a sampled pixel counts as dark.
pub const DARK_PIXEL_THRESHOLD: f64 = 60.0;
/// Channel variance above which a sampled pixel counts as irregular.
pub const IRREGULAR_VARIANCE_THRESHOLD: u16 = 100;

/// Global statistics of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelFeatures {
    pub image_width: u32,
    pub image_height: u32,
    pub sampled_pixels: usize,
    pub dark_spot_count: usize,
    pub dark_spot_points: Vec<Point>,
    pub average_brightness: f64,
    pub irregularity_count: usize,
    pub irregular_points: Vec<Point>,
    pub dark_spot_bounding_box: Option<BoundingBox>,
    pub irregular_bounding_box: Option<BoundingBox>,
}

impl PixelFeatures {
    pub fn bounding_box(&self, class: RegionClass) -> Option<BoundingBox> {
        match class {
            RegionClass::Dark => self.dark_spot_bounding_box,
            RegionClass::Irregular => self.irregular_bounding_box,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PixelFeatureAnalyzer;

impl PixelFeatureAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, frame: &PixelBuffer) -> PixelFeatures {
        let (width, height) = (frame.width(), frame.height());
        let mut dark_spot_points = Vec::new();
        let mut irregular_points = Vec::new();
        let mut total_brightness = 0.0;
        let mut sampled_pixels = 0usize;

        for y in (0..height).step_by(SAMPLE_STRIDE as usize) {
            for x in (0..width).step_by(SAMPLE_STRIDE as usize) {
                let pixel = frame.pixel(x, y);
                let brightness = pixel.brightness();
                total_brightness += brightness;
                sampled_pixels += 1;

                if brightness < DARK_PIXEL_THRESHOLD {
                    dark_spot_points.push(Point::new(x, y));
                }
                if pixel.channel_variance() > IRREGULAR_VARIANCE_THRESHOLD {
                    irregular_points.push(Point::new(x, y));
                }
            }
        }

        let average_brightness = if sampled_pixels > 0 {
            total_brightness / sampled_pixels as f64
        } else {
            0.0
        };

        let dark_spot_bounding_box =
            BoundingBox::enclosing(&dark_spot_points, BOUNDING_BOX_PADDING, width, height);
        let irregular_bounding_box =
            BoundingBox::enclosing(&irregular_points, BOUNDING_BOX_PADDING, width, height);

        PixelFeatures {
            image_width: width,
            image_height: height,
            sampled_pixels,
            dark_spot_count: dark_spot_points.len(),
            dark_spot_points,
            average_brightness,
            irregularity_count: irregular_points.len(),
            irregular_points,
            dark_spot_bounding_box,
            irregular_bounding_box,
        }
    }
}
