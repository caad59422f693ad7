// src/correlation/manual.rs
//
// Operator-driven matching. Instead of the nearest live trajectory, only
// identities the operator picked beforehand can be selected, and only on
// the frame their trajectory starts.

use crate::config::ManualConfig;
use crate::geometry::Point;
use crate::trajectory::{NearestMatch, TrajectoryStore};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    #[default]
    Automatic,
    Manual {
        ids: Vec<u64>,
    },
}

impl MatchStrategy {
    pub fn from_config(config: &ManualConfig) -> Self {
        if config.is_active() {
            MatchStrategy::Manual {
                ids: config.ids.clone(),
            }
        } else {
            MatchStrategy::Automatic
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, MatchStrategy::Manual { .. })
    }
}

/// First listed identity with a trajectory starting at `frame` whose
/// recorded position is strictly within `max_distance` of `center`. Every
/// trajectory sharing a listed id is considered.
pub fn match_manual<'a>(
    store: &'a TrajectoryStore,
    ids: &[u64],
    center: Point,
    frame: u64,
    max_distance: f64,
) -> Option<NearestMatch<'a>> {
    ids.iter()
        .flat_map(|&id| store.objects_with_id(id))
        .filter(|object| object.initial_frame == frame)
        .find_map(|object| {
            let position = object.position_at(frame)?;
            let distance = center.distance_to(&position);
            (distance < max_distance).then_some(NearestMatch {
                object,
                initial_frame: object.initial_frame,
                distance,
            })
        })
}
