// src/correlation/mod.rs

pub mod candidate;
pub mod engine;
pub mod manual;
pub mod needle;
pub mod state;

pub use candidate::{CorrelatedRecord, FireTrigger, SelectedCandidate};
pub use engine::CorrelationEngine;
pub use manual::MatchStrategy;
pub use state::{CorrelationState, DwellPhase};
