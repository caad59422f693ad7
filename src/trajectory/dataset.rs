// src/trajectory/dataset.rs
//
// Trajectory dataset loading. Two exporter layouts are in circulation:
//
//   keyed:     { "<id>": { id, initialFrame, finalFrame, positions,
//                          motilityParameters, score }, ... }
//              optionally wrapped as { "objectId": "...", "objects": {...} }
//
//   sequences: { "AnalyzedSequencesInVideo": [ { "SpermsInSequence": [
//                  { id, InitialFrame, FinalFrame, Positions, VSL, VCL, ... }
//              ] } ] }
//
// A malformed file, or any record missing a required field, fails the
// whole load. There is no per-record recovery.

use crate::error::{CorrelatorError, Result};
use crate::trajectory::store::{MotilityParameters, TrackedObject, TrajectoryPoint, TrajectoryStore};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// `[frame, x, y]` as written by the exporters.
type RawPosition = (u64, f64, f64);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyedRecord {
    id: u64,
    initial_frame: u64,
    final_frame: u64,
    positions: Vec<RawPosition>,
    motility_parameters: MotilityParameters,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrappedDataset {
    object_id: Option<String>,
    objects: BTreeMap<String, KeyedRecord>,
}

#[derive(Debug, Deserialize)]
struct SequenceDataset {
    #[serde(rename = "AnalyzedSequencesInVideo")]
    sequences: Vec<SequenceRecord>,
    #[serde(rename = "objectID", default)]
    object_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SequenceRecord {
    #[serde(rename = "SpermsInSequence")]
    objects: Vec<SequenceObject>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct SequenceObject {
    id: u64,
    InitialFrame: u64,
    FinalFrame: u64,
    Positions: Vec<RawPosition>,
    VSL: f64,
    VCL: f64,
    VAP: f64,
    LIN: f64,
    ALH: f64,
    WOB: f64,
    STR: f64,
    BCF: f64,
    MAD: f64,
    ROT: f64,
    Rank: Value,
    #[serde(default)]
    SiDScore: f64,
}

impl KeyedRecord {
    fn into_object(self) -> Result<TrackedObject> {
        TrackedObject::new(
            self.id,
            self.initial_frame,
            self.final_frame,
            to_points(self.positions),
            self.motility_parameters,
            self.score,
        )
    }
}

impl SequenceObject {
    fn into_object(self) -> Result<TrackedObject> {
        let motility = MotilityParameters {
            vsl: self.VSL,
            vcl: self.VCL,
            vap: self.VAP,
            lin: self.LIN,
            alh: self.ALH,
            wob: self.WOB,
            straightness: self.STR,
            bcf: self.BCF,
            mad: self.MAD,
            rot: self.ROT,
            rank: Some(self.Rank),
        };
        TrackedObject::new(
            self.id,
            self.InitialFrame,
            self.FinalFrame,
            to_points(self.Positions),
            motility,
            self.SiDScore,
        )
    }
}

fn to_points(raw: Vec<RawPosition>) -> Vec<TrajectoryPoint> {
    raw.into_iter()
        .map(|(frame, x, y)| TrajectoryPoint::new(frame, x, y))
        .collect()
}

impl TrajectoryStore {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| CorrelatorError::io(path, e))?;
        let store = Self::from_json_str(&text).map_err(|e| match e {
            DatasetError::Json(source) => CorrelatorError::TrajectoryParse {
                path: path.to_path_buf(),
                source,
            },
            DatasetError::Invalid(err) => err,
        })?;

        info!(
            "✓ Loaded {} tracked object(s) from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }

    fn from_json_str(text: &str) -> std::result::Result<Self, DatasetError> {
        let value: Value = serde_json::from_str(text)?;

        if value.get("AnalyzedSequencesInVideo").is_some() {
            let dataset: SequenceDataset = serde_json::from_value(value)?;
            let objects = dataset
                .sequences
                .into_iter()
                .flat_map(|s| s.objects)
                .map(SequenceObject::into_object)
                .collect::<Result<Vec<_>>>()?;
            return Ok(TrajectoryStore::new(dataset.object_id, objects));
        }

        if value.get("objects").is_some() {
            let dataset: WrappedDataset = serde_json::from_value(value)?;
            let objects = dataset
                .objects
                .into_values()
                .map(KeyedRecord::into_object)
                .collect::<Result<Vec<_>>>()?;
            return Ok(TrajectoryStore::new(dataset.object_id, objects));
        }

        let records: BTreeMap<String, KeyedRecord> = serde_json::from_value(value)?;
        let objects = records
            .into_values()
            .map(KeyedRecord::into_object)
            .collect::<Result<Vec<_>>>()?;
        Ok(TrajectoryStore::new(None, objects))
    }
}

#[derive(Debug)]
enum DatasetError {
    Json(serde_json::Error),
    Invalid(CorrelatorError),
}

impl From<serde_json::Error> for DatasetError {
    fn from(e: serde_json::Error) -> Self {
        DatasetError::Json(e)
    }
}

impl From<CorrelatorError> for DatasetError {
    fn from(e: CorrelatorError) -> Self {
        DatasetError::Invalid(e)
    }
}
