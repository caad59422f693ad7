// src/trajectory/mod.rs

mod dataset;
pub mod reconcile;
pub mod store;

pub use reconcile::CoordinateReconciler;
pub use store::{MotilityParameters, NearestMatch, TrackedObject, TrajectoryPoint, TrajectoryStore};
