// src/morphology/descriptor.rs
//
// Shape descriptor of the selected object's mask.
//
// The detector's boxes sit a little tight, more so at the bottom than at the
// top, so the crop is padded per edge before contour extraction. Every ratio
// that would divide by zero is reported as 0. Consumers treat 0 as "undefined
// for this shape", not as a measurement.

use super::contour::{find_external_contours, Contour};
use super::ellipse::fit_ellipse;
use crate::types::{Mask, NormBox};
use ndarray::s;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::warn;

const PAD_LEFT: i64 = 6;
const PAD_TOP: i64 = 12;
const PAD_RIGHT: i64 = 6;
const PAD_BOTTOM: i64 = 14;

/// Feature names as they appear in the standardization table and on the wire.
pub const FEATURE_NAMES: [&str; 14] = [
    "area",
    "perimeter",
    "aspect_ratio",
    "extend",
    "orientated_angle",
    "circularity",
    "hull_area",
    "solidity",
    "hull_perimeter",
    "convexity",
    "eccentricity",
    "compactness",
    "major_axis_radius",
    "minor_axis_radius",
];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MorphologyDescriptor {
    pub area: f64,
    pub perimeter: f64,
    pub aspect_ratio: f64,
    #[serde(rename = "extend")]
    pub extent: f64,
    #[serde(rename = "orientated_angle")]
    pub orientation_angle: f64,
    pub circularity: f64,
    pub hull_area: f64,
    pub solidity: f64,
    pub hull_perimeter: f64,
    pub convexity: f64,
    pub eccentricity: f64,
    pub compactness: f64,
    pub major_axis_radius: f64,
    pub minor_axis_radius: f64,
}

impl MorphologyDescriptor {
    /// `(wire name, value)` pairs in table order.
    pub fn features(&self) -> [(&'static str, f64); 14] {
        let values = [
            self.area,
            self.perimeter,
            self.aspect_ratio,
            self.extent,
            self.orientation_angle,
            self.circularity,
            self.hull_area,
            self.solidity,
            self.hull_perimeter,
            self.convexity,
            self.eccentricity,
            self.compactness,
            self.major_axis_radius,
            self.minor_axis_radius,
        ];
        let mut out = [("", 0.0); 14];
        for (i, (name, value)) in FEATURE_NAMES.iter().zip(values).enumerate() {
            out[i] = (*name, value);
        }
        out
    }

    /// New descriptor with every feature replaced by `f(name, value)`.
    pub fn map_features(&self, mut f: impl FnMut(&str, f64) -> f64) -> Self {
        let v: Vec<f64> = self.features().iter().map(|&(n, x)| f(n, x)).collect();
        Self {
            area: v[0],
            perimeter: v[1],
            aspect_ratio: v[2],
            extent: v[3],
            orientation_angle: v[4],
            circularity: v[5],
            hull_area: v[6],
            solidity: v[7],
            hull_perimeter: v[8],
            convexity: v[9],
            eccentricity: v[10],
            compactness: v[11],
            major_axis_radius: v[12],
            minor_axis_radius: v[13],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.features().iter().all(|&(_, v)| v == 0.0)
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Describe the object covered by `bbox` in the full-frame `mask`.
pub fn extract(mask: &Mask, bbox: &NormBox) -> MorphologyDescriptor {
    match try_extract(mask, bbox) {
        Ok(d) => d,
        Err(e) => {
            warn!("⚠️  Contour analysis failed ({}), reporting an empty shape", e);
            MorphologyDescriptor::default()
        }
    }
}

fn try_extract(mask: &Mask, bbox: &NormBox) -> opencv::Result<MorphologyDescriptor> {
    let mw = mask.width() as i64;
    let mh = mask.height() as i64;

    let x1 = ((bbox.x_min * mw as f64) as i64 - PAD_LEFT).max(0);
    let y1 = ((bbox.y_min * mh as f64) as i64 - PAD_TOP).max(0);
    let x2 = ((bbox.x_max * mw as f64) as i64 + PAD_RIGHT).min(mw);
    let y2 = ((bbox.y_max * mh as f64) as i64 + PAD_BOTTOM).min(mh);
    if x2 <= x1 || y2 <= y1 {
        return Ok(MorphologyDescriptor::default());
    }

    let region = mask
        .view()
        .slice_move(s![y1 as usize..y2 as usize, x1 as usize..x2 as usize]);
    let contours = find_external_contours(region)?;

    // First of equal areas wins
    let mut largest: Option<(&Contour, f64)> = None;
    for contour in &contours {
        let area = contour.area()?;
        if largest.map_or(true, |(_, best)| area > best) {
            largest = Some((contour, area));
        }
    }
    let Some((largest, area)) = largest else {
        return Ok(MorphologyDescriptor::default());
    };

    describe(largest, area, bbox)
}

fn describe(contour: &Contour, area: f64, bbox: &NormBox) -> opencv::Result<MorphologyDescriptor> {
    let perimeter = contour.arc_length()?;

    let hull = contour.convex_hull()?;
    let hull_area = hull.area()?;
    let hull_perimeter = hull.arc_length()?;

    let mut d = MorphologyDescriptor {
        area,
        perimeter,
        aspect_ratio: ratio(bbox.width(), bbox.height()),
        extent: ratio(area, bbox.area()),
        circularity: ratio(4.0 * PI * area, perimeter * perimeter),
        hull_area,
        solidity: ratio(area, hull_area),
        hull_perimeter,
        convexity: ratio(perimeter, hull_perimeter),
        compactness: ratio((4.0 * area / PI).sqrt(), perimeter),
        ..Default::default()
    };

    if let Some(ellipse) = fit_ellipse(contour.points())? {
        d.orientation_angle = ellipse.angle;
        d.eccentricity = ellipse.eccentricity();
        d.major_axis_radius = ellipse.major_radius();
        d.minor_axis_radius = ellipse.minor_radius();
    }

    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: usize = 200;

    fn frac(px: f64) -> f64 {
        px / SIZE as f64
    }

    #[test]
    fn test_circle_is_round() {
        let r = 30.0;
        let mask = Mask::from_fn(SIZE, SIZE, |x, y| {
            let dx = x as f64 - 100.0;
            let dy = y as f64 - 100.0;
            dx * dx + dy * dy <= r * r
        });
        let bbox = NormBox::new(frac(70.0), frac(70.0), frac(131.0), frac(131.0));
        let d = extract(&mask, &bbox);

        assert!(d.circularity > 0.85 && d.circularity < 1.05, "{}", d.circularity);
        assert!(d.eccentricity < 0.1, "{}", d.eccentricity);
        assert!((d.major_axis_radius - r).abs() < 1.5);
        assert!((d.solidity - 1.0).abs() < 0.05);
        assert!((d.aspect_ratio - 1.0).abs() < 1e-9);
        assert!(d.compactness > 0.0);
    }

    #[test]
    fn test_empty_region_is_all_zero() {
        let mask = Mask::empty(SIZE, SIZE);
        let d = extract(&mask, &NormBox::new(0.2, 0.2, 0.4, 0.4));
        assert!(d.is_zero());
        assert_eq!(d, MorphologyDescriptor::default());
    }

    #[test]
    fn test_box_outside_mask_is_all_zero() {
        let mask = Mask::from_fn(SIZE, SIZE, |_, _| true);
        let d = extract(&mask, &NormBox::new(1.2, 1.2, 1.5, 1.5));
        assert!(d.is_zero());
    }

    #[test]
    fn test_rectangle_has_no_ellipse() {
        let mask = Mask::from_fn(SIZE, SIZE, |x, y| (50..90).contains(&x) && (60..80).contains(&y));
        let bbox = NormBox::new(frac(50.0), frac(60.0), frac(90.0), frac(80.0));
        let d = extract(&mask, &bbox);

        assert!((d.area - 741.0).abs() < 1e-9); // 39 × 19 between pixel centres
        assert!((d.perimeter - 116.0).abs() < 1e-9);
        assert!((d.hull_area - 741.0).abs() < 1e-9);
        assert!((d.solidity - 1.0).abs() < 1e-9);
        assert!((d.convexity - 1.0).abs() < 1e-9);
        assert!((d.aspect_ratio - 2.0).abs() < 1e-9);
        assert!((d.extent - 741.0 / bbox.area()).abs() < 1e-6);

        // Four corners only: no ellipse
        assert_eq!(d.orientation_angle, 0.0);
        assert_eq!(d.eccentricity, 0.0);
        assert_eq!(d.major_axis_radius, 0.0);
        assert_eq!(d.minor_axis_radius, 0.0);
    }

    #[test]
    fn test_largest_contour_wins() {
        let mask = Mask::from_fn(SIZE, SIZE, |x, y| {
            ((40..44).contains(&x) && (40..44).contains(&y))
                || ((60..90).contains(&x) && (50..70).contains(&y))
        });
        let bbox = NormBox::new(frac(40.0), frac(40.0), frac(90.0), frac(70.0));
        let d = extract(&mask, &bbox);
        assert!((d.area - 29.0 * 19.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_pixel_guards_divisions() {
        let mask = Mask::from_fn(SIZE, SIZE, |x, y| x == 100 && y == 100);
        let bbox = NormBox::new(frac(99.0), frac(99.0), frac(101.0), frac(101.0));
        let d = extract(&mask, &bbox);
        assert_eq!(d.area, 0.0);
        assert_eq!(d.circularity, 0.0);
        assert_eq!(d.solidity, 0.0);
        assert_eq!(d.convexity, 0.0);
        assert_eq!(d.compactness, 0.0);
    }

    #[test]
    fn test_wire_names() {
        let d = MorphologyDescriptor {
            extent: 0.5,
            orientation_angle: 12.0,
            ..Default::default()
        };
        let json = serde_json::to_value(d).unwrap();
        assert_eq!(json["extend"], 0.5);
        assert_eq!(json["orientated_angle"], 12.0);
        assert_eq!(json.as_object().unwrap().len(), 14);

        let doubled = d.map_features(|_, v| v * 2.0);
        assert_eq!(doubled.extent, 1.0);
        assert_eq!(doubled.features()[4], ("orientated_angle", 24.0));
    }
}
