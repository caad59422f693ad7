// src/correlation/state.rs
//
// Debounce and dwell bookkeeping for one run. Owned by exactly one engine
// and only ever advanced in frame order.

use crate::config::EngineConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DwellPhase {
    Idle,
    PipetteDwelling,
    Fired,
}

impl DwellPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DwellPhase::Idle => "IDLE",
            DwellPhase::PipetteDwelling => "PIPETTE_DWELLING",
            DwellPhase::Fired => "FIRED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationState {
    /// Frame of the last accepted collision; `None` is "never".
    pub last_collision_frame: Option<u64>,
    pub cooldown_frames: u64,
    /// Frame the tool was first seen on the target in this cycle.
    pub pipette_detected_frame: Option<u64>,
    pub save_frame_delay: u64,
    /// Fire-once flag for the current dwell cycle.
    pub frame_saved: bool,
    pub paused: bool,
    pub awaiting_operator_choice: bool,
    /// Operator already captured this cycle by hand.
    pub manual_snapshot_taken: bool,
}

impl CorrelationState {
    pub fn new(cooldown_frames: u64, save_frame_delay: u64) -> Self {
        Self {
            last_collision_frame: None,
            cooldown_frames,
            pipette_detected_frame: None,
            save_frame_delay,
            frame_saved: false,
            paused: false,
            awaiting_operator_choice: false,
            manual_snapshot_taken: false,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.cooldown_frames, config.save_frame_delay())
    }

    pub fn phase(&self) -> DwellPhase {
        if self.frame_saved || self.manual_snapshot_taken {
            DwellPhase::Fired
        } else if self.pipette_detected_frame.is_some() {
            DwellPhase::PipetteDwelling
        } else {
            DwellPhase::Idle
        }
    }

    /// Strictly more than `cooldown_frames` since the last accepted collision.
    pub fn cooldown_elapsed(&self, frame: u64) -> bool {
        match self.last_collision_frame {
            None => true,
            Some(last) => frame.saturating_sub(last) > self.cooldown_frames,
        }
    }

    pub fn accept_collision(&mut self, frame: u64) {
        self.last_collision_frame = Some(frame);
    }

    /// Back to `Idle`: a new selection opens a new cycle.
    pub fn reset_dwell(&mut self) {
        self.pipette_detected_frame = None;
        self.frame_saved = false;
        self.manual_snapshot_taken = false;
        self.awaiting_operator_choice = false;
    }

    /// Captures already taken in this cycle still count.
    pub fn start_dwell(&mut self, frame: u64) {
        self.pipette_detected_frame = Some(frame);
    }

    /// Dwell has lasted strictly longer than `save_frame_delay` and nothing
    /// has fired yet in this cycle.
    pub fn dwell_due(&self, frame: u64) -> bool {
        match self.pipette_detected_frame {
            Some(start) => {
                frame.saturating_sub(start) > self.save_frame_delay
                    && !self.frame_saved
                    && !self.manual_snapshot_taken
            }
            None => false,
        }
    }
}
