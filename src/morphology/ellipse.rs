// src/morphology/ellipse.rs
//
// Ellipse fitted to contour points with `imgproc::fit_ellipse`, reported
// like OpenCV's rotated rectangle: full axis lengths and the angle in
// degrees.

use opencv::core::{Point, RotatedRect, Vector};
use opencv::imgproc;

const MIN_POINTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedEllipse {
    pub center: (f64, f64),
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

impl FittedEllipse {
    pub fn major_radius(&self) -> f64 {
        self.width.max(self.height) / 2.0
    }

    pub fn minor_radius(&self) -> f64 {
        self.width.min(self.height) / 2.0
    }

    /// `sqrt(1 - (b/a)^2)`; 0 for a degenerate fit.
    pub fn eccentricity(&self) -> f64 {
        let a = self.major_radius();
        let b = self.minor_radius();
        if a <= 0.0 {
            return 0.0;
        }
        (1.0 - (b / a).powi(2)).max(0.0).sqrt()
    }
}

impl From<RotatedRect> for FittedEllipse {
    fn from(r: RotatedRect) -> Self {
        Self {
            center: (r.center.x as f64, r.center.y as f64),
            width: r.size.width as f64,
            height: r.size.height as f64,
            angle: r.angle as f64,
        }
    }
}

/// `None` with fewer than five points or a non-finite fit.
pub fn fit_ellipse(points: &Vector<Point>) -> opencv::Result<Option<FittedEllipse>> {
    if points.len() < MIN_POINTS {
        return Ok(None);
    }

    let ellipse = FittedEllipse::from(imgproc::fit_ellipse(points)?);
    let finite = [ellipse.width, ellipse.height, ellipse.angle]
        .iter()
        .all(|v| v.is_finite());
    Ok(finite.then_some(ellipse))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cx: f64, cy: f64, a: f64, b: f64, theta_deg: f64, n: usize) -> Vector<Point> {
        let th = theta_deg.to_radians();
        (0..n)
            .map(|i| {
                let t = i as f64 / n as f64 * std::f64::consts::TAU;
                let (x, y) = (a * t.cos(), b * t.sin());
                let rx = cx + x * th.cos() - y * th.sin();
                let ry = cy + x * th.sin() + y * th.cos();
                Point::new(rx.round() as i32, ry.round() as i32)
            })
            .collect()
    }

    #[test]
    fn test_too_few_points() {
        let square: Vector<Point> = [(0, 0), (1, 0), (1, 1), (0, 1)]
            .iter()
            .map(|&(x, y)| Point::new(x, y))
            .collect();
        assert!(fit_ellipse(&square).unwrap().is_none());
    }

    #[test]
    fn test_circle() {
        let e = fit_ellipse(&sample(200.0, 150.0, 40.0, 40.0, 0.0, 180)).unwrap().unwrap();
        assert!((e.center.0 - 200.0).abs() < 0.5);
        assert!((e.center.1 - 150.0).abs() < 0.5);
        assert!((e.major_radius() - 40.0).abs() < 1.0);
        assert!((e.minor_radius() - 40.0).abs() < 1.0);
        assert!(e.eccentricity() < 0.25);
    }

    #[test]
    fn test_rotated_ellipse_eccentricity() {
        let e = fit_ellipse(&sample(300.0, 200.0, 50.0, 30.0, 30.0, 360)).unwrap().unwrap();
        assert!((e.major_radius() - 50.0).abs() < 1.5);
        assert!((e.minor_radius() - 30.0).abs() < 1.5);
        assert!((e.eccentricity() - 0.8).abs() < 0.05);
    }

    #[test]
    fn test_degenerate_eccentricity() {
        let e = FittedEllipse {
            center: (0.0, 0.0),
            width: 0.0,
            height: 0.0,
            angle: 0.0,
        };
        assert_eq!(e.eccentricity(), 0.0);
        assert_eq!(e.major_radius(), 0.0);
    }
}
