// src/morphology/contour.rs
//
// Outer borders of a binary raster via OpenCV.
//
// The region is copied into a single-channel Mat and handed to
// `imgproc::find_contours` with external retrieval and simple chain
// approximation, so straight runs keep only their end points. Points are
// pixel centres: a single pixel has zero area and a 2×2 block has area 1.

use ndarray::ArrayView2;
use opencv::{
    core::{self, Mat, Point, Vector},
    imgproc,
    prelude::*,
};

#[derive(Debug)]
pub struct Contour {
    points: Vector<Point>,
}

impl Contour {
    pub fn new(points: Vector<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &Vector<Point> {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn area(&self) -> opencv::Result<f64> {
        imgproc::contour_area(&self.points, false)
    }

    /// Closed perimeter.
    pub fn arc_length(&self) -> opencv::Result<f64> {
        imgproc::arc_length(&self.points, true)
    }

    pub fn convex_hull(&self) -> opencv::Result<Contour> {
        let mut hull = Vector::<Point>::new();
        imgproc::convex_hull(&self.points, &mut hull, false, true)?;
        Ok(Contour::new(hull))
    }
}

/// Copy a non-empty `u8` raster into an 8-bit single-channel Mat, foreground
/// as 255.
fn region_to_mat(region: ArrayView2<'_, u8>) -> opencv::Result<(Vec<u8>, Mat)> {
    let (rows, cols) = region.dim();
    let mut data: Vec<u8> = region.iter().map(|&v| if v > 0 { 255 } else { 0 }).collect();

    let mat = unsafe {
        Mat::new_rows_cols_with_data(
            rows as i32,
            cols as i32,
            core::CV_8UC1,
            data.as_mut_ptr() as *mut core::c_void,
            core::Mat_AUTO_STEP,
        )?
    };
    // `data` backs the Mat and must outlive it
    Ok((data, mat))
}

/// Outer borders of every 8-connected foreground component.
pub fn find_external_contours(region: ArrayView2<'_, u8>) -> opencv::Result<Vec<Contour>> {
    if region.is_empty() {
        return Ok(Vec::new());
    }

    let (_data, mat) = region_to_mat(region)?;
    let mut contours = Vector::<Vector<Point>>::new();
    imgproc::find_contours(
        &mat,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
        Point::new(0, 0),
    )?;

    Ok(contours.into_iter().map(Contour::new).collect())
}
