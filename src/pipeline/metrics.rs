// src/pipeline/metrics.rs
//
// Per-run counters, fed from the event bus and the frame loop. Logged as a
// summary when the run ends.

use crate::pipeline::event_bus::CorrelationEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub total_detections: Arc<AtomicU64>,
    pub collisions: Arc<AtomicU64>,
    pub selections: Arc<AtomicU64>,
    pub dwell_starts: Arc<AtomicU64>,
    pub records_fired: Arc<AtomicU64>,
    pub manual_captures: Arc<AtomicU64>,
    pub pauses: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            total_detections: Arc::new(AtomicU64::new(0)),
            collisions: Arc::new(AtomicU64::new(0)),
            selections: Arc::new(AtomicU64::new(0)),
            dwell_starts: Arc::new(AtomicU64::new(0)),
            records_fired: Arc::new(AtomicU64::new(0)),
            manual_captures: Arc::new(AtomicU64::new(0)),
            pauses: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self, detections: usize) {
        self.inc(&self.total_frames);
        self.total_detections
            .fetch_add(detections as u64, Ordering::Relaxed);
    }

    pub fn observe(&self, event: &CorrelationEvent) {
        match event {
            CorrelationEvent::Collision { .. } => self.inc(&self.collisions),
            CorrelationEvent::CandidateSelected { .. } => self.inc(&self.selections),
            CorrelationEvent::DwellStarted { .. } => self.inc(&self.dwell_starts),
            CorrelationEvent::RecordFired { manual, .. } => {
                self.inc(&self.records_fired);
                if *manual {
                    self.inc(&self.manual_captures);
                }
            }
            CorrelationEvent::OperatorPaused { .. } => self.inc(&self.pauses),
            CorrelationEvent::OperatorResumed { .. } => {}
        }
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            total_detections: self.total_detections.load(Ordering::Relaxed),
            fps: self.fps(),
            collisions: self.collisions.load(Ordering::Relaxed),
            selections: self.selections.load(Ordering::Relaxed),
            dwell_starts: self.dwell_starts.load(Ordering::Relaxed),
            records_fired: self.records_fired.load(Ordering::Relaxed),
            manual_captures: self.manual_captures.load(Ordering::Relaxed),
            pauses: self.pauses.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub total_detections: u64,
    pub fps: f64,
    pub collisions: u64,
    pub selections: u64,
    pub dwell_starts: u64,
    pub records_fired: u64,
    pub manual_captures: u64,
    pub pauses: u64,
    pub elapsed_secs: f64,
}
