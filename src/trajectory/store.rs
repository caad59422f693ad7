// src/trajectory/store.rs
//
// In-memory index of pre-recorded trajectories, built once per run.
//
// Positions are indexed by `frame - initial_frame`. Any frame outside an
// object's window, or any index past the end of its recorded positions,
// is "no data for this frame" and never an error.
//
// Per frame the session rescales exactly the positions recorded for that
// frame into pixel space (see `reconcile_frame`); afterwards they are
// read-only. Nearest-neighbour lookups read the previous frame's positions,
// which were reconciled one iteration earlier.

use crate::error::{CorrelatorError, Result};
use crate::geometry::Point;
use crate::trajectory::reconcile::CoordinateReconciler;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Precomputed kinematics for one trajectory (CASA-style summary).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotilityParameters {
    #[serde(rename = "VSL")]
    pub vsl: f64,
    #[serde(rename = "VCL")]
    pub vcl: f64,
    #[serde(rename = "VAP")]
    pub vap: f64,
    #[serde(rename = "LIN")]
    pub lin: f64,
    #[serde(rename = "ALH")]
    pub alh: f64,
    #[serde(rename = "WOB")]
    pub wob: f64,
    #[serde(rename = "STR")]
    pub straightness: f64,
    #[serde(rename = "BCF")]
    pub bcf: f64,
    #[serde(rename = "MAD")]
    pub mad: f64,
    #[serde(rename = "ROT")]
    pub rot: f64,
    /// Rank label from the trajectory analysis; its type varies by exporter
    pub rank: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryPoint {
    pub frame: u64,
    pub position: Point,
    /// Set once the position has been mapped into frame pixels.
    reconciled: bool,
}

impl TrajectoryPoint {
    pub fn new(frame: u64, x: f64, y: f64) -> Self {
        Self {
            frame,
            position: Point::new(x, y),
            reconciled: false,
        }
    }

    pub fn is_reconciled(&self) -> bool {
        self.reconciled
    }
}

#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub id: u64,
    /// Inclusive validity window
    pub initial_frame: u64,
    pub final_frame: u64,
    positions: Vec<TrajectoryPoint>,
    pub motility: MotilityParameters,
    /// Quality score assigned by the trajectory analysis
    pub score: f64,
}

impl TrackedObject {
    pub fn new(
        id: u64,
        initial_frame: u64,
        final_frame: u64,
        positions: Vec<TrajectoryPoint>,
        motility: MotilityParameters,
        score: f64,
    ) -> Result<Self> {
        if initial_frame > final_frame {
            return Err(CorrelatorError::InvalidWindow {
                id,
                initial_frame,
                final_frame,
            });
        }
        Ok(Self {
            id,
            initial_frame,
            final_frame,
            positions,
            motility,
            score,
        })
    }

    pub fn is_active_at(&self, frame: u64) -> bool {
        self.initial_frame <= frame && frame <= self.final_frame
    }

    fn index_for(&self, frame: u64) -> Option<usize> {
        if !self.is_active_at(frame) {
            return None;
        }
        let idx = (frame - self.initial_frame) as usize;
        (idx < self.positions.len()).then_some(idx)
    }

    pub fn position_at(&self, frame: u64) -> Option<Point> {
        self.index_for(frame).map(|idx| self.positions[idx].position)
    }

    pub fn positions(&self) -> &[TrajectoryPoint] {
        &self.positions
    }

    /// Rescale the position recorded for `frame`. Returns false when the
    /// frame has no data or the position was already reconciled.
    fn reconcile_at(
        &mut self,
        frame: u64,
        reconciler: &CoordinateReconciler,
        frame_width: u32,
        frame_height: u32,
    ) -> bool {
        let Some(idx) = self.index_for(frame) else {
            return false;
        };
        let point = &mut self.positions[idx];
        if point.reconciled {
            return false;
        }
        point.position = reconciler.reconcile(point.position, frame_width, frame_height);
        point.reconciled = true;
        true
    }
}

/// Winner of a nearest-trajectory lookup.
#[derive(Debug, Clone, Copy)]
pub struct NearestMatch<'a> {
    pub object: &'a TrackedObject,
    pub initial_frame: u64,
    pub distance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TrajectoryStore {
    /// Identifier of the analysed video, when the dataset carries one
    object_id: Option<String>,
    objects: Vec<TrackedObject>,
}

impl TrajectoryStore {
    /// Objects are kept in ascending id order, which is also the scan order
    /// used to break distance ties.
    pub fn new(object_id: Option<String>, mut objects: Vec<TrackedObject>) -> Self {
        objects.sort_by_key(|o| o.id);
        Self { object_id, objects }
    }

    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// First object carrying `id`.
    pub fn get(&self, id: u64) -> Option<&TrackedObject> {
        self.objects_with_id(id).next()
    }

    /// Every object carrying `id`, in dataset order. The legacy sequence
    /// format can repeat an id across separate trajectories.
    pub fn objects_with_id(&self, id: u64) -> impl Iterator<Item = &TrackedObject> {
        self.objects.iter().filter(move |o| o.id == id)
    }

    pub fn objects_active_at(&self, frame: u64) -> impl Iterator<Item = &TrackedObject> {
        self.objects.iter().filter(move |o| o.is_active_at(frame))
    }

    pub fn position_at(&self, object: &TrackedObject, frame: u64) -> Option<Point> {
        object.position_at(frame)
    }

    /// Closest trajectory to `point`, strictly under `max_distance`.
    ///
    /// Candidates are read at `frame - 1`: the position recorded for a frame
    /// describes the object entering that frame. Ties keep the first object
    /// in scan order.
    pub fn find_nearest(&self, point: Point, frame: u64, max_distance: f64) -> Option<NearestMatch<'_>> {
        let lag_frame = frame.checked_sub(1)?;
        let mut best: Option<NearestMatch<'_>> = None;

        for object in self.objects_active_at(lag_frame) {
            let Some(position) = object.position_at(lag_frame) else {
                continue;
            };
            let distance = point.distance_to(&position);
            if distance >= max_distance {
                continue;
            }
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(NearestMatch {
                    object,
                    initial_frame: object.initial_frame,
                    distance,
                });
            }
        }

        if let Some(m) = &best {
            debug!(
                "Nearest trajectory to ({:.1}, {:.1}) at frame {}: #{} at {:.2}px",
                point.x, point.y, frame, m.object.id, m.distance
            );
        }
        best
    }

    /// Resolve a fixed identity list, keeping the caller's order.
    pub fn objects_with_ids(&self, ids: &[u64]) -> Vec<&TrackedObject> {
        let mut found = Vec::new();
        for &id in ids {
            let before = found.len();
            found.extend(self.objects_with_id(id));
            if found.len() == before {
                warn!("Selected identity #{} is not in the trajectory dataset", id);
            }
        }
        found
    }

    /// Rescale every position recorded for `frame` into pixel space.
    /// Returns how many positions were converted.
    pub fn reconcile_frame(
        &mut self,
        frame: u64,
        reconciler: &CoordinateReconciler,
        frame_width: u32,
        frame_height: u32,
    ) -> usize {
        self.objects
            .iter_mut()
            .filter(|o| o.is_active_at(frame))
            .map(|o| o.reconcile_at(frame, reconciler, frame_width, frame_height))
            .filter(|&converted| converted)
            .count()
    }
}
