// src/error.rs
//
// Fatal conditions only. Anything that can happen on an ordinary frame
// (object outside its window, no match, degenerate contour) is expressed
// as `Option` by the operation itself and never reaches this type.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorrelatorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trajectory dataset {path} is malformed: {source}")]
    TrajectoryParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("tracked object {id} has initial frame {initial_frame} after final frame {final_frame}")]
    InvalidWindow {
        id: u64,
        initial_frame: u64,
        final_frame: u64,
    },

    #[error("standardization table {path} is malformed: {source}")]
    StatsParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("standardization table has no entry for configuration key {0}")]
    MissingConfigurationKey(String),

    #[error("detection stream {path}, line {line}: {source}")]
    DetectionParse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("classifier assessments {path} are malformed: {source}")]
    AssessmentParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("mask run-lengths cover {covered} pixels, expected {expected}")]
    MaskLength { covered: usize, expected: usize },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("snapshot payload is not valid base64: {0}")]
    SnapshotEncoding(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, CorrelatorError>;

impl CorrelatorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CorrelatorError::Io {
            path: path.into(),
            source,
        }
    }
}
