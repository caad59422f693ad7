// src/correlation/needle.rs
//
// Needle tip localisation and the anchor box used as the collision probe.
//
// The needle can enter from either side of the field. When the mask's
// leftmost column sits within `edge_px` of the left border the needle comes
// in from the left and its tip is the rightmost mask point; otherwise the
// tip is the leftmost point. The anchor box covers the tip, reaching
// `margin` past it and `size` back along the shaft.

use crate::config::EngineConfig;
use crate::geometry::{Point, Rect};
use crate::types::Detection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipSide {
    /// Tip is the leftmost mask point, shaft extends to the right.
    Left,
    /// Tip is the rightmost mask point, shaft extends to the left.
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeedleTip {
    pub point: Point,
    pub side: TipSide,
}

#[derive(Debug, Clone, Copy)]
pub struct AnchorGeometry {
    /// Tunable, compared against raw mask columns
    pub edge_px: usize,
    pub margin: f64,
    pub size: f64,
}

impl AnchorGeometry {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            edge_px: config.needle_tip_edge_px,
            margin: config.anchor_margin_px,
            size: config.anchor_size_px,
        }
    }
}

impl Default for AnchorGeometry {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Tip in frame pixels. An empty mask falls back to the box's top-left.
pub fn locate_tip(
    detection: &Detection,
    frame_width: u32,
    frame_height: u32,
    edge_px: usize,
) -> NeedleTip {
    let mask = &detection.mask;
    let Some((left, right)) = mask.extreme_points() else {
        let b = detection.bbox.to_pixels(frame_width, frame_height);
        return NeedleTip {
            point: Point::new(b.x_min, b.y_min),
            side: TipSide::Left,
        };
    };

    let ((x, y), side) = if left.0 < edge_px {
        (right, TipSide::Right)
    } else {
        (left, TipSide::Left)
    };

    let sx = frame_width as f64 / mask.width().max(1) as f64;
    let sy = frame_height as f64 / mask.height().max(1) as f64;
    NeedleTip {
        point: Point::new((x as f64 * sx).trunc(), (y as f64 * sy).trunc()),
        side,
    }
}

pub fn anchor_box(tip: &NeedleTip, geometry: &AnchorGeometry) -> Rect {
    let Point { x, y } = tip.point;
    match tip.side {
        TipSide::Left => Rect::new(
            x - geometry.margin,
            y - geometry.margin,
            x + geometry.size,
            y + geometry.size,
        ),
        TipSide::Right => Rect::new(
            x - geometry.size,
            y - geometry.margin,
            x + geometry.margin,
            y + geometry.size,
        ),
    }
}
