// src/morphology/mod.rs

pub mod contour;
pub mod descriptor;
pub mod ellipse;

pub use descriptor::{extract, MorphologyDescriptor, FEATURE_NAMES};
pub use ellipse::FittedEllipse;
