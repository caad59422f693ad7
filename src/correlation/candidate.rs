// src/correlation/candidate.rs

use crate::collaborators::{ClassifierResponse, TargetObservation};
use crate::morphology::{self, MorphologyDescriptor};
use crate::snapshot::Snapshot;
use crate::standardize::FeatureStandardizer;
use crate::trajectory::{MotilityParameters, TrackedObject};
use crate::types::{Detection, Mask, NormBox};
use serde::Serialize;
use uuid::Uuid;

/// The tracked object picked up by the tool, filled in as the event unfolds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectedCandidate {
    pub id: Option<u64>,
    pub motility: MotilityParameters,
    /// Trajectory quality score
    pub score: f64,
    pub initial_frame: Option<u64>,
    /// Frame the candidate was selected on
    pub frame: Option<u64>,
    pub match_distance: Option<f64>,
    pub bbox: Option<NormBox>,
    #[serde(skip)]
    pub mask: Option<Mask>,
    pub morphology: Option<MorphologyDescriptor>,
    pub standardized_morphology: Option<MorphologyDescriptor>,
    pub snapshot: Option<Snapshot>,
}

impl SelectedCandidate {
    pub fn select(
        object: &TrackedObject,
        detection: &Detection,
        frame: u64,
        match_distance: f64,
        snapshot: Option<Snapshot>,
    ) -> Self {
        Self {
            id: Some(object.id),
            motility: object.motility.clone(),
            score: object.score,
            initial_frame: Some(object.initial_frame),
            frame: Some(frame),
            match_distance: Some(match_distance),
            bbox: Some(detection.bbox),
            mask: Some(detection.mask.clone()),
            morphology: None,
            standardized_morphology: None,
            snapshot,
        }
    }

    pub fn is_selected(&self) -> bool {
        self.id.is_some()
    }

    /// Compute raw and standardized morphology from the stored mask. Runs
    /// once per selection; later calls keep the first result.
    pub fn describe(&mut self, standardizer: &FeatureStandardizer) {
        if self.morphology.is_some() {
            return;
        }
        let (Some(mask), Some(bbox)) = (&self.mask, &self.bbox) else {
            return;
        };
        let raw = morphology::extract(mask, bbox);
        self.standardized_morphology = Some(standardizer.standardize(&raw));
        self.morphology = Some(raw);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FireTrigger {
    Dwell,
    Operator,
}

/// One fired dwell cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelatedRecord {
    pub id: Uuid,
    pub frame: u64,
    pub trigger: FireTrigger,
    pub candidate: SelectedCandidate,
    pub assessment: Option<ClassifierResponse>,
    pub target_snapshot: Option<Snapshot>,
}

impl CorrelatedRecord {
    /// Target the classifier reported, if any.
    pub fn target(&self) -> Option<&TargetObservation> {
        self.assessment.as_ref().and_then(ClassifierResponse::primary)
    }

    pub fn is_usable(&self) -> bool {
        self.target().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standardize::{FeatureStats, StatsTable};
    use crate::trajectory::store::tests::stationary;
    use std::collections::BTreeMap;

    fn standardizer() -> FeatureStandardizer {
        let mut stats = BTreeMap::new();
        stats.insert(
            "area_mean".to_string(),
            FeatureStats {
                lambda: 1.0,
                mean: 0.0,
                scale: 2.0,
            },
        );
        let mut table = StatsTable::default();
        table.insert("k", stats);
        FeatureStandardizer::new(&table, "k").unwrap()
    }

    #[test]
    fn test_select_copies_trajectory_fields() {
        let object = stationary(462, 10, 40, 100.0, 100.0);
        let detection = Detection {
            class_id: 0,
            bbox: NormBox::new(0.1, 0.1, 0.2, 0.2),
            mask: Mask::empty(4, 4),
            confidence: 0.8,
        };
        let c = SelectedCandidate::select(&object, &detection, 20, 1.5, None);
        assert!(c.is_selected());
        assert_eq!(c.id, Some(462));
        assert_eq!(c.initial_frame, Some(10));
        assert_eq!(c.frame, Some(20));
        assert_eq!(c.score, 0.5);
        assert!(!SelectedCandidate::default().is_selected());
    }

    #[test]
    fn test_describe_runs_once() {
        let mut c = SelectedCandidate {
            id: Some(1),
            bbox: Some(NormBox::new(0.25, 0.25, 0.5, 0.5)),
            mask: Some(Mask::from_fn(40, 40, |x, y| {
                (10..20).contains(&x) && (10..20).contains(&y)
            })),
            ..Default::default()
        };
        c.describe(&standardizer());
        let raw = c.morphology.unwrap();
        assert!((raw.area - 81.0).abs() < 1e-9);
        assert!((c.standardized_morphology.unwrap().area - 40.5).abs() < 1e-9);

        c.mask = Some(Mask::empty(40, 40));
        c.describe(&standardizer());
        assert_eq!(c.morphology.unwrap().area, raw.area);
    }

    #[test]
    fn test_record_without_target_is_unusable() {
        let record = CorrelatedRecord {
            id: Uuid::new_v4(),
            frame: 5,
            trigger: FireTrigger::Dwell,
            candidate: SelectedCandidate::default(),
            assessment: Some(ClassifierResponse::default()),
            target_snapshot: None,
        };
        assert!(!record.is_usable());
    }
}
