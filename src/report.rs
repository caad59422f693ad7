// src/report.rs
//
// End-of-run aggregation. Records whose classifier found no target are
// dropped; every remaining record is scored once and contributes one
// candidate, one target and one score, in firing order.

use crate::collaborators::{OutcomeScorer, ScoringRequest, TargetFeatures};
use crate::correlation::{CorrelatedRecord, SelectedCandidate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub engine: String,
    pub generated_at: DateTime<Utc>,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            engine: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub frame: u64,
    pub masks: serde_json::Value,
    pub features: TargetFeatures,
    pub blasto_probability: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub object_id: Option<String>,
    pub version: VersionInfo,
    pub candidates: Vec<SelectedCandidate>,
    pub targets: Vec<TargetSummary>,
    pub scores: Vec<Option<serde_json::Value>>,
    pub dropped_records: usize,
}

impl RunReport {
    pub fn build(
        object_id: Option<&str>,
        records: &[CorrelatedRecord],
        scorer: &dyn OutcomeScorer,
    ) -> Self {
        let mut report = Self {
            object_id: object_id.map(str::to_string),
            version: VersionInfo::current(),
            candidates: Vec::new(),
            targets: Vec::new(),
            scores: Vec::new(),
            dropped_records: 0,
        };

        for record in records {
            let Some(target) = record.target() else {
                warn!(
                    "Record {} (frame {}) dropped: no target found",
                    record.id, record.frame
                );
                report.dropped_records += 1;
                continue;
            };

            let request = ScoringRequest::new(&record.candidate, target);
            report.scores.push(scorer.score(&request));
            report.candidates.push(record.candidate.clone());
            report.targets.push(TargetSummary {
                frame: record.frame,
                masks: target.masks.clone(),
                features: target.features.clone(),
                blasto_probability: target.blasto_probability,
            });
        }

        info!(
            "📋 Report: {} usable record(s), {} dropped",
            report.candidates.len(),
            report.dropped_records
        );
        report
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
