// src/lib.rs
//
// ICSI event correlation. Fuses a per-frame detection stream (motile
// objects, the injection needle, the target and the target-holding tool)
// with pre-computed trajectories to decide which tracked object was picked
// up, when it was delivered, and what it looked like.

pub mod collaborators;
pub mod config;
pub mod console;
pub mod correlation;
pub mod error;
pub mod geometry;
pub mod morphology;
pub mod pipeline;
pub mod replay;
pub mod report;
pub mod snapshot;
pub mod standardize;
pub mod trajectory;
pub mod types;

pub use config::Config;
pub use correlation::{CorrelatedRecord, CorrelationEngine, FireTrigger, SelectedCandidate};
pub use error::{CorrelatorError, Result};
pub use pipeline::{RunOutcome, RunSession};
pub use report::RunReport;
pub use trajectory::TrajectoryStore;
