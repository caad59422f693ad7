// src/geometry.rs
//
// Pixel-space primitives shared by the correlation engine and the
// trajectory store. All coordinates are f64 pixels, y grows downward.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        distance(*self, *other)
    }
}

/// Axis-aligned rectangle, `[x_min, y_min, x_max, y_max]` in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Rect {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn center(&self) -> Point {
        center(self)
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        overlaps(self, other)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// Two rectangles overlap unless they are strictly separated on x or on y.
/// Touching edges count as overlap.
pub fn overlaps(a: &Rect, b: &Rect) -> bool {
    if a.x_max < b.x_min || a.x_min > b.x_max {
        return false;
    }
    if a.y_max < b.y_min || a.y_min > b.y_max {
        return false;
    }
    true
}

pub fn center(r: &Rect) -> Point {
    Point::new((r.x_min + r.x_max) / 2.0, (r.y_min + r.y_max) / 2.0)
}

pub fn distance(p: Point, q: Point) -> f64 {
    ((q.x - p.x).powi(2) + (q.y - p.y).powi(2)).sqrt()
}
