// src/correlation/engine.rs
//
// Frame-loop state machine fusing detector output with trajectory data.
//
// Per frame:
//   1. every needle detection yields an anchor box around its tip,
//   2. motile detections are matched against trajectories (nearest live
//      trajectory behind a collision + cooldown gate, or the operator's
//      fixed identity list in manual mode),
//   3. a target in view with a selected candidate drives the dwell timer,
//      and the cycle fires once the target tool has been on the target for
//      longer than the dwell threshold.
//
// Anchors are collected before any motile detection is looked at, so the
// outcome does not depend on the order the detector lists its boxes in.

use crate::collaborators::SnapshotClassifier;
use crate::config::Config;
use crate::correlation::candidate::{CorrelatedRecord, FireTrigger, SelectedCandidate};
use crate::correlation::manual::{match_manual, MatchStrategy};
use crate::correlation::needle::{anchor_box, locate_tip, AnchorGeometry};
use crate::correlation::state::{CorrelationState, DwellPhase};
use crate::geometry::Rect;
use crate::pipeline::event_bus::{CorrelationEvent, EventBus};
use crate::pipeline::frame_context::FrameContext;
use crate::snapshot::Snapshot;
use crate::standardize::FeatureStandardizer;
use crate::trajectory::{NearestMatch, TrajectoryStore};
use crate::types::{Detection, DetectionRole};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct CorrelationEngine {
    state: CorrelationState,
    candidate: SelectedCandidate,
    strategy: MatchStrategy,
    anchors: AnchorGeometry,
    max_match_distance: f64,
    interactive: bool,
    standardizer: FeatureStandardizer,
    classifier: Box<dyn SnapshotClassifier>,
    events: EventBus,
}

impl CorrelationEngine {
    pub fn new(
        config: &Config,
        standardizer: FeatureStandardizer,
        classifier: Box<dyn SnapshotClassifier>,
    ) -> Self {
        let strategy = MatchStrategy::from_config(&config.manual);
        let state = CorrelationState::from_config(&config.engine);

        info!(
            "✓ Correlation engine ready ({} matching, cooldown {} frames, dwell {} frames)",
            if strategy.is_manual() { "manual" } else { "automatic" },
            state.cooldown_frames,
            state.save_frame_delay
        );

        Self {
            interactive: strategy.is_manual() && config.manual.interactive,
            state,
            candidate: SelectedCandidate::default(),
            strategy,
            anchors: AnchorGeometry::from_config(&config.engine),
            max_match_distance: config.trajectory.max_match_distance_px,
            standardizer,
            classifier,
            events: EventBus::default(),
        }
    }

    pub fn state(&self) -> &CorrelationState {
        &self.state
    }

    pub fn phase(&self) -> DwellPhase {
        self.state.phase()
    }

    pub fn candidate(&self) -> &SelectedCandidate {
        &self.candidate
    }

    pub fn strategy(&self) -> &MatchStrategy {
        &self.strategy
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn drain_events(&mut self) -> Vec<CorrelationEvent> {
        self.events.drain()
    }

    /// Fresh state and an empty candidate, as at the start of a run.
    pub fn reset(&mut self) {
        self.state = CorrelationState::new(self.state.cooldown_frames, self.state.save_frame_delay);
        self.candidate = SelectedCandidate::default();
        self.events.clear();
        debug!("Correlation engine reset");
    }

    /// Swap the classification backend, e.g. for the next run's recorded
    /// assessments.
    pub fn set_classifier(&mut self, classifier: Box<dyn SnapshotClassifier>) {
        self.classifier = classifier;
    }

    // ========================================================================
    // FRAME STEP
    // ========================================================================

    /// Correlate one frame. Returns the record when this frame fires the
    /// current dwell cycle.
    pub fn process_frame(
        &mut self,
        ctx: &FrameContext,
        store: &TrajectoryStore,
    ) -> Option<CorrelatedRecord> {
        if self.state.paused {
            debug!("Paused, frame {} not correlated", ctx.index());
            return None;
        }

        let anchors: Vec<Rect> = ctx
            .with_role(DetectionRole::Needle)
            .map(|d| {
                let tip = locate_tip(d, ctx.width(), ctx.height(), self.anchors.edge_px);
                anchor_box(&tip, &self.anchors)
            })
            .collect();
        let target_present = ctx.has_role(DetectionRole::Target);

        for detection in ctx.with_role(DetectionRole::Motile) {
            self.on_motile(detection, ctx, store, &anchors, target_present);
        }

        if target_present {
            return self.on_target(ctx);
        }
        None
    }

    fn on_motile(
        &mut self,
        detection: &Detection,
        ctx: &FrameContext,
        store: &TrajectoryStore,
        anchors: &[Rect],
        target_present: bool,
    ) {
        let frame = ctx.index();
        let pixel_box = detection.bbox.to_pixels(ctx.width(), ctx.height());
        let center = pixel_box.center();
        let mut collided = false;

        let found = match &self.strategy {
            MatchStrategy::Manual { ids } => {
                match_manual(store, ids, center, frame, self.max_match_distance)
            }
            MatchStrategy::Automatic => {
                // Tool already on the target: contacts are no longer pickups
                if target_present
                    || !anchors.iter().any(|a| a.overlaps(&pixel_box))
                    || !self.state.cooldown_elapsed(frame)
                {
                    None
                } else {
                    collided = true;
                    store.find_nearest(center, frame, self.max_match_distance)
                }
            }
        };

        if collided {
            self.events.publish(CorrelationEvent::Collision { frame });
            if found.is_none() {
                debug!(
                    "Collision at frame {} near ({:.0}, {:.0}) has no trajectory within {:.0}px",
                    frame, center.x, center.y, self.max_match_distance
                );
            }
        }

        if let Some(m) = found {
            if !self.strategy.is_manual() {
                self.state.accept_collision(frame);
            }
            self.select(m, detection, ctx);
        }
    }

    fn select(&mut self, m: NearestMatch<'_>, detection: &Detection, ctx: &FrameContext) {
        let frame = ctx.index();
        let snapshot = Snapshot::capture(&ctx.frame);
        self.candidate = SelectedCandidate::select(m.object, detection, frame, m.distance, snapshot);
        self.state.reset_dwell();

        self.events.publish(CorrelationEvent::CandidateSelected {
            frame,
            object_id: m.object.id,
            distance: m.distance,
        });
        info!(
            "🎯 Candidate #{} selected at frame {} ({:.1}px from trajectory, tracked since frame {})",
            m.object.id, frame, m.distance, m.initial_frame
        );
    }

    fn on_target(&mut self, ctx: &FrameContext) -> Option<CorrelatedRecord> {
        let id = self.candidate.id?;
        let frame = ctx.index();
        self.candidate.describe(&self.standardizer);

        if self.interactive
            && !self.state.awaiting_operator_choice
            && self.state.phase() != DwellPhase::Fired
        {
            self.state.awaiting_operator_choice = true;
            info!(
                "⏸️  Target in view with candidate #{} at frame {}: [p]ause, [r]esume, [s]end now",
                id, frame
            );
        }

        if !ctx.has_role(DetectionRole::TargetTool) {
            return None;
        }

        if self.state.pipette_detected_frame.is_none() {
            self.state.start_dwell(frame);
            self.events.publish(CorrelationEvent::DwellStarted { frame });
            info!(
                "⏱️  Dwell started at frame {} (fires after {} frames)",
                frame, self.state.save_frame_delay
            );
            return None;
        }

        if self.state.dwell_due(frame) {
            self.state.frame_saved = true;
            return Some(self.fire(ctx, FireTrigger::Dwell));
        }
        None
    }

    fn fire(&mut self, ctx: &FrameContext, trigger: FireTrigger) -> CorrelatedRecord {
        let frame = ctx.index();
        let target_snapshot = Snapshot::capture(&ctx.frame);
        let assessment = self.classifier.classify(frame, target_snapshot.as_ref());

        let record = CorrelatedRecord {
            id: Uuid::new_v4(),
            frame,
            trigger,
            candidate: self.candidate.clone(),
            assessment,
            target_snapshot,
        };

        if !record.is_usable() {
            warn!(
                "⚠️  Classifier found no target at frame {}, record {} will not be scored",
                frame, record.id
            );
        }

        self.events.publish(CorrelationEvent::RecordFired {
            frame,
            record_id: record.id,
            object_id: record.candidate.id,
            manual: trigger == FireTrigger::Operator,
        });
        info!(
            "🚀 Record {} fired at frame {} for candidate #{}",
            record.id,
            frame,
            record.candidate.id.map_or("-".to_string(), |id| id.to_string())
        );
        record
    }

    // ========================================================================
    // OPERATOR CONTROLS
    // ========================================================================

    pub fn pause(&mut self, frame: u64) {
        if self.state.paused {
            return;
        }
        self.state.paused = true;
        self.state.awaiting_operator_choice = false;
        self.events.publish(CorrelationEvent::OperatorPaused { frame });
        info!("⏸️  Paused at frame {}", frame);
    }

    pub fn resume(&mut self, frame: u64) {
        if !self.state.paused {
            return;
        }
        self.state.paused = false;
        self.state.awaiting_operator_choice = false;
        self.events.publish(CorrelationEvent::OperatorResumed { frame });
        info!("▶️  Resumed at frame {}", frame);
    }

    /// Capture and classify right now, bypassing the dwell timer. Allowed
    /// once per cycle; suppresses the automatic capture for that cycle.
    pub fn send_now(&mut self, ctx: &FrameContext) -> Option<CorrelatedRecord> {
        let frame = ctx.index();
        if !self.candidate.is_selected() {
            warn!("⚠️  Send-now ignored at frame {}: no candidate selected", frame);
            return None;
        }
        if self.state.phase() == DwellPhase::Fired {
            warn!(
                "⚠️  Send-now ignored at frame {}: this cycle already fired",
                frame
            );
            return None;
        }

        self.candidate.describe(&self.standardizer);
        self.state.manual_snapshot_taken = true;
        self.state.awaiting_operator_choice = false;
        Some(self.fire(ctx, FireTrigger::Operator))
    }
}
