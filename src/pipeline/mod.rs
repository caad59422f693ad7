// src/pipeline/mod.rs

pub mod event_bus;
pub mod frame_context;
pub mod metrics;
pub mod session;

pub use event_bus::{CorrelationEvent, EventBus};
pub use frame_context::FrameContext;
pub use metrics::{MetricsSummary, RunMetrics};
pub use session::{RunOutcome, RunSession};
