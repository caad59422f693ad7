// src/types.rs

use crate::error::{CorrelatorError, Result};
use crate::geometry::Rect;
use image::RgbImage;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Value written into mask rasters for foreground pixels.
pub const MASK_ON: u8 = 255;

/// What a detector class means to the correlation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionRole {
    /// The motile object that gets picked up (sperm).
    Motile,
    /// Injection needle. Its tip is the collision probe.
    Needle,
    /// The destination object (oocyte).
    Target,
    /// Holding pipette seen together with the target while injecting.
    TargetTool,
    Other,
}

impl DetectionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionRole::Motile => "MOTILE",
            DetectionRole::Needle => "NEEDLE",
            DetectionRole::Target => "TARGET",
            DetectionRole::TargetTool => "TARGET_TOOL",
            DetectionRole::Other => "OTHER",
        }
    }
}

/// Detector box in fractional image coordinates, each value in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct NormBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl NormBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Pixel box for a frame of the given size. Coordinates are truncated
    /// toward zero like the detector's integer overlays.
    pub fn to_pixels(&self, width: u32, height: u32) -> Rect {
        let w = width as f64;
        let h = height as f64;
        Rect::new(
            (self.x_min * w).trunc(),
            (self.y_min * h).trunc(),
            (self.x_max * w).trunc(),
            (self.y_max * h).trunc(),
        )
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

impl From<[f64; 4]> for NormBox {
    fn from(v: [f64; 4]) -> Self {
        NormBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<NormBox> for [f64; 4] {
    fn from(b: NormBox) -> Self {
        [b.x_min, b.y_min, b.x_max, b.y_max]
    }
}

/// Full-frame binary segmentation raster at the detector's mask resolution.
/// Rows are y, columns are x.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    pixels: Array2<u8>,
}

impl Mask {
    pub fn new(pixels: Array2<u8>) -> Self {
        Self { pixels }
    }

    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            pixels: Array2::zeros((height, width)),
        }
    }

    pub fn from_fn(width: usize, height: usize, on: impl Fn(usize, usize) -> bool) -> Self {
        let pixels =
            Array2::from_shape_fn((height, width), |(y, x)| if on(x, y) { MASK_ON } else { 0 });
        Self { pixels }
    }

    /// Decode row-major run lengths that alternate background/foreground,
    /// starting with background. The runs must cover the raster exactly.
    pub fn from_rle(width: usize, height: usize, counts: &[usize]) -> Result<Self> {
        let expected = width * height;
        let covered: usize = counts.iter().sum();
        if covered != expected {
            return Err(CorrelatorError::MaskLength { covered, expected });
        }

        let mut flat = Vec::with_capacity(expected);
        for (i, &run) in counts.iter().enumerate() {
            let value = if i % 2 == 0 { 0 } else { MASK_ON };
            flat.extend(std::iter::repeat(value).take(run));
        }

        let pixels = Array2::from_shape_vec((height, width), flat).map_err(|_| {
            CorrelatorError::MaskLength {
                covered,
                expected,
            }
        })?;
        Ok(Self { pixels })
    }

    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    pub fn is_on(&self, x: usize, y: usize) -> bool {
        self.pixels
            .get((y, x))
            .map(|&v| v > 0)
            .unwrap_or(false)
    }

    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.pixels.view()
    }

    pub fn count_on(&self) -> usize {
        self.pixels.iter().filter(|&&v| v > 0).count()
    }

    /// Leftmost and rightmost foreground pixels as `(x, y)` mask coordinates.
    /// Ties on the column resolve to the topmost pixel.
    pub fn extreme_points(&self) -> Option<((usize, usize), (usize, usize))> {
        let mut left: Option<(usize, usize)> = None;
        let mut right: Option<(usize, usize)> = None;

        for ((y, x), &v) in self.pixels.indexed_iter() {
            if v == 0 {
                continue;
            }
            if left.map_or(true, |(lx, _)| x < lx) {
                left = Some((x, y));
            }
            if right.map_or(true, |(rx, _)| x > rx) {
                right = Some((x, y));
            }
        }

        Some((left?, right?))
    }
}

/// One detector output for one frame. Immutable once received.
#[derive(Debug, Clone)]
pub struct Detection {
    pub class_id: u32,
    pub bbox: NormBox,
    pub mask: Mask,
    pub confidence: f64,
}

/// A decoded frame. Pixels are optional: without them no snapshot can be
/// captured, but correlation still runs.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub image: Option<Arc<RgbImage>>,
}

impl Frame {
    pub fn new(index: u64, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
            image: None,
        }
    }

    pub fn with_image(mut self, image: RgbImage) -> Self {
        self.image = Some(Arc::new(image));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_box_to_pixels_truncates() {
        let b = NormBox::new(0.1, 0.25, 0.5, 0.999);
        let r = b.to_pixels(640, 480);
        assert_eq!(r, Rect::new(64.0, 120.0, 320.0, 479.0));
    }

    #[test]
    fn test_mask_from_rle() {
        // 4x2 raster: row0 = 0 1 1 0, row1 = 0 0 0 1
        let mask = Mask::from_rle(4, 2, &[1, 2, 4, 1]).unwrap();
        assert!(!mask.is_on(0, 0));
        assert!(mask.is_on(1, 0));
        assert!(mask.is_on(2, 0));
        assert!(mask.is_on(3, 1));
        assert_eq!(mask.count_on(), 3);
    }

    #[test]
    fn test_mask_from_rle_rejects_short_runs() {
        let err = Mask::from_rle(4, 2, &[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            CorrelatorError::MaskLength {
                covered: 3,
                expected: 8
            }
        ));
    }

    #[test]
    fn test_extreme_points() {
        let mask = Mask::from_fn(10, 10, |x, y| (2..=7).contains(&x) && (3..=5).contains(&y));
        let (left, right) = mask.extreme_points().unwrap();
        assert_eq!(left, (2, 3));
        assert_eq!(right, (7, 3));
        assert!(Mask::empty(5, 5).extreme_points().is_none());
    }

    #[test]
    fn test_norm_box_serializes_as_array() {
        let b = NormBox::new(0.1, 0.2, 0.3, 0.4);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[0.1,0.2,0.3,0.4]");
        let back: NormBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }
}
