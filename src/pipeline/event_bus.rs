// src/pipeline/event_bus.rs
//
// The correlation engine publishes what happened on each frame here instead
// of calling into the session. The session drains the bus once per frame
// and feeds the counters in `RunMetrics`.

use std::collections::VecDeque;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationEvent {
    /// Tool anchor overlapped a motile object past the cooldown window.
    Collision { frame: u64 },

    CandidateSelected {
        frame: u64,
        object_id: u64,
        /// Pixel distance to the matched trajectory point
        distance: f64,
    },

    DwellStarted { frame: u64 },

    RecordFired {
        frame: u64,
        record_id: Uuid,
        object_id: Option<u64>,
        manual: bool,
    },

    OperatorPaused { frame: u64 },

    OperatorResumed { frame: u64 },
}

pub struct EventBus {
    events: VecDeque<CorrelationEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: CorrelationEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<CorrelationEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
