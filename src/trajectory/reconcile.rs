// src/trajectory/reconcile.rs
//
// Trajectory positions are recorded at a fixed reference width (640 px)
// while the live video may be captured at any resolution. Every position
// must be mapped into the current frame's pixel space before it is
// compared against a detector box, otherwise every distance match is off
// by the resolution ratio.

use crate::config::TrajectoryConfig;
use crate::geometry::Point;

#[derive(Debug, Clone, Copy)]
pub struct CoordinateReconciler {
    reference_width: u32,
    edge_margin: u32,
}

impl CoordinateReconciler {
    pub fn new(reference_width: u32, edge_margin: u32) -> Self {
        Self {
            reference_width: reference_width.max(1),
            edge_margin,
        }
    }

    pub fn from_config(config: &TrajectoryConfig) -> Self {
        Self::new(config.reference_width, config.edge_margin_px)
    }

    /// Uniform scale factor from reference space into a frame of `frame_width`.
    pub fn scale_for(&self, frame_width: u32) -> f64 {
        frame_width as f64 / self.reference_width as f64
    }

    /// Map a reference-space point into frame pixels.
    ///
    /// Both axes use the width ratio (capture resolutions share an aspect
    /// ratio). The result is rounded to whole pixels, halves to even, and
    /// pulled in so the point plus `edge_margin` stays inside the frame on
    /// all four sides.
    pub fn reconcile(&self, point: Point, frame_width: u32, frame_height: u32) -> Point {
        let scale = self.scale_for(frame_width);
        let dim = self.edge_margin as f64;
        let w = frame_width as f64;
        let h = frame_height as f64;

        let mut x = (point.x * scale).round_ties_even();
        let mut y = (point.y * scale).round_ties_even();

        if x + dim > w {
            x = w - dim;
        }
        if x - dim < 0.0 {
            x = dim;
        }
        if y + dim > h {
            y = h - dim;
        }
        if y - dim < 0.0 {
            y = dim;
        }

        Point::new(x, y)
    }
}

impl Default for CoordinateReconciler {
    fn default() -> Self {
        Self::new(640, 10)
    }
}
