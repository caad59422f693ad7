// src/collaborators.rs
//
// Contracts with the two external services a fired record is handed to:
//
//   - the snapshot classifier, which looks at the target snapshot and
//     returns per-target shape/maturity features (or nothing found), and
//   - the outcome scorer, which takes the combined candidate + target
//     feature vector and returns a prediction.
//
// Only the payload shapes live here. The built-in implementations work
// from files on disk; network transports plug in behind the same traits.

use crate::correlation::SelectedCandidate;
use crate::error::{CorrelatorError, Result};
use crate::morphology::MorphologyDescriptor;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// CLASSIFIER PAYLOADS
// ============================================================================

/// Target shape features reported by the classifier. Absent fields are 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetFeatures {
    pub cyto_minor_minoraxis: f64,
    pub cyto_majoraxis: f64,
    pub cyto_eccentricity: f64,
    pub cyto_area: f64,
    pub granu_minor_minoraxis: f64,
    pub granu_majoraxis: f64,
    pub granu_eccentricity: f64,
    pub granu_area: f64,
    pub granu_area_rel: f64,
    pub polarbody_minor_minoraxis: f64,
    pub polarbody_majoraxis: f64,
    pub polarbody_eccentricity: f64,
    pub polarbody_area: f64,
    pub peri_cyto_minoraxis: f64,
    pub peri_cyto_majoraxis: f64,
    pub peri_cyto_eccentricity: f64,
    pub peri_cyto_area: f64,
    pub zp_peri_cyto_minoraxis: f64,
    pub zp_peri_cyto_majoraxis: f64,
    pub zp_peri_cyto_eccentricity: f64,
    pub zp_peri_cyto_area: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetObservation {
    /// Segmentation payload, passed through untouched
    #[serde(default)]
    pub masks: serde_json::Value,
    #[serde(default)]
    pub features: TargetFeatures,
    #[serde(default)]
    pub blasto_probability: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResponse {
    #[serde(default)]
    pub oocytes: Vec<TargetObservation>,
}

impl ClassifierResponse {
    /// First reported target. `None` is the "no object found" sentinel.
    pub fn primary(&self) -> Option<&TargetObservation> {
        self.oocytes.first()
    }
}

pub trait SnapshotClassifier {
    /// Classify the target at `frame`. `None` or an empty response both mean
    /// no usable target for this cycle.
    fn classify(&self, frame: u64, snapshot: Option<&Snapshot>) -> Option<ClassifierResponse>;
}

/// Serves classifier responses recorded next to a run, keyed by firing frame.
#[derive(Debug, Clone, Default)]
pub struct SidecarClassifier {
    responses: BTreeMap<u64, ClassifierResponse>,
}

impl SidecarClassifier {
    pub fn new(responses: BTreeMap<u64, ClassifierResponse>) -> Self {
        Self { responses }
    }

    /// A missing file yields a classifier that never finds a target.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No classifier assessments at {}", path.display());
            return Ok(Self::default());
        }
        let text =
            std::fs::read_to_string(path).map_err(|e| CorrelatorError::io(path, e))?;
        let responses = serde_json::from_str(&text).map_err(|source| {
            CorrelatorError::AssessmentParse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let classifier = Self::new(responses);
        info!(
            "✓ Loaded {} classifier assessment(s) from {}",
            classifier.responses.len(),
            path.display()
        );
        Ok(classifier)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl SnapshotClassifier for SidecarClassifier {
    fn classify(&self, frame: u64, snapshot: Option<&Snapshot>) -> Option<ClassifierResponse> {
        debug!(
            "Classifier lookup for frame {} (snapshot: {})",
            frame,
            snapshot.is_some()
        );
        self.responses.get(&frame).cloned()
    }
}

// ============================================================================
// SCORER PAYLOADS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringBody {
    #[serde(rename = "VSL")]
    pub vsl: f64,
    #[serde(rename = "VCL")]
    pub vcl: f64,
    #[serde(rename = "MAD")]
    pub mad: f64,
    #[serde(rename = "LIN")]
    pub lin: f64,
    #[serde(rename = "ALH")]
    pub alh: f64,
    #[serde(flatten)]
    pub target: TargetFeatures,
    /// Standardized morphology of the candidate
    #[serde(flatten)]
    pub morphology: MorphologyDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringRequest {
    pub body: ScoringBody,
    pub normalized: bool,
}

impl ScoringRequest {
    pub fn new(candidate: &SelectedCandidate, target: &TargetObservation) -> Self {
        let motility = &candidate.motility;
        Self {
            body: ScoringBody {
                vsl: motility.vsl,
                vcl: motility.vcl,
                mad: motility.mad,
                lin: motility.lin,
                alh: motility.alh,
                target: target.features.clone(),
                morphology: candidate.standardized_morphology.unwrap_or_default(),
            },
            normalized: false,
        }
    }
}

pub trait OutcomeScorer {
    fn score(&self, request: &ScoringRequest) -> Option<serde_json::Value>;
}

/// Keeps the request for later submission and returns no prediction.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferredScorer;

impl OutcomeScorer for DeferredScorer {
    fn score(&self, request: &ScoringRequest) -> Option<serde_json::Value> {
        debug!(
            "Scoring deferred (VSL {:.2}, area {:.3})",
            request.body.vsl, request.body.morphology.area
        );
        None
    }
}
