// src/replay.rs
//
// Recorded detection streams. A run directory holds:
//
//   detections.jsonl   one frame per line:
//                      { frame, width, height, image?, detections: [
//                        { class_id, bbox, confidence, mask: { width, height, counts } } ] }
//   trajectories.json  the trajectory dataset for the same video
//   assessments.json   optional recorded classifier responses by frame
//
// Masks are full-frame rasters at the detector's mask resolution, run-length
// encoded row-major, alternating background/foreground from background.

use crate::error::{CorrelatorError, Result};
use crate::types::{Detection, Frame, Mask, NormBox};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub const DETECTIONS_FILE: &str = "detections.jsonl";
pub const TRAJECTORIES_FILE: &str = "trajectories.json";
pub const ASSESSMENTS_FILE: &str = "assessments.json";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunDirectory {
    pub name: String,
    pub root: PathBuf,
}

impl RunDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "run".to_string());
        Self { name, root }
    }

    pub fn detections_path(&self) -> PathBuf {
        self.root.join(DETECTIONS_FILE)
    }

    pub fn trajectories_path(&self) -> PathBuf {
        self.root.join(TRAJECTORIES_FILE)
    }

    pub fn assessments_path(&self) -> PathBuf {
        self.root.join(ASSESSMENTS_FILE)
    }
}

/// Every directory under `input_dir` holding both a detection stream and a
/// trajectory dataset, sorted by path.
pub fn find_runs(input_dir: impl AsRef<Path>) -> Vec<RunDirectory> {
    let mut runs: Vec<RunDirectory> = WalkDir::new(input_dir.as_ref())
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == DETECTIONS_FILE)
        .filter_map(|e| e.path().parent().map(Path::to_path_buf))
        .filter(|dir| {
            let complete = dir.join(TRAJECTORIES_FILE).is_file();
            if !complete {
                warn!(
                    "Skipping {}: no {} next to the detection stream",
                    dir.display(),
                    TRAJECTORIES_FILE
                );
            }
            complete
        })
        .map(RunDirectory::new)
        .collect();
    runs.sort();

    info!("Found {} run(s)", runs.len());
    runs
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    frame: u64,
    width: u32,
    height: u32,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    class_id: u32,
    bbox: NormBox,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    mask: Option<RawMask>,
}

#[derive(Debug, Deserialize)]
struct RawMask {
    width: usize,
    height: usize,
    counts: Vec<usize>,
}

/// Anything that yields frames in order together with their detections.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<(Frame, Vec<Detection>)>>;
}

impl FrameSource for std::vec::IntoIter<(Frame, Vec<Detection>)> {
    fn next_frame(&mut self) -> Result<Option<(Frame, Vec<Detection>)>> {
        Ok(self.next())
    }
}

pub struct DetectionReader {
    path: PathBuf,
    root: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl DetectionReader {
    pub fn open(run: &RunDirectory) -> Result<Self> {
        Self::open_path(run.detections_path(), &run.root)
    }

    /// `root` resolves relative `image` paths.
    pub fn open_path(path: impl AsRef<Path>, root: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| CorrelatorError::io(&path, e))?;
        info!("Opening detection stream: {}", path.display());
        Ok(Self {
            lines: BufReader::new(file).lines(),
            root: root.as_ref().to_path_buf(),
            path,
            line_no: 0,
        })
    }

    pub fn read_frame(&mut self) -> Result<Option<(Frame, Vec<Detection>)>> {
        loop {
            let Some(line) = self.lines.next() else {
                return Ok(None);
            };
            self.line_no += 1;
            let line = line.map_err(|e| CorrelatorError::io(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }

            let raw: RawFrame =
                serde_json::from_str(&line).map_err(|source| CorrelatorError::DetectionParse {
                    path: self.path.clone(),
                    line: self.line_no,
                    source,
                })?;
            return self.decode(raw).map(Some);
        }
    }

    fn decode(&self, raw: RawFrame) -> Result<(Frame, Vec<Detection>)> {
        let mut frame = Frame::new(raw.frame, raw.width, raw.height);

        if let Some(name) = &raw.image {
            let image_path = self.root.join(name);
            match image::open(&image_path) {
                Ok(img) => frame = frame.with_image(img.to_rgb8()),
                Err(e) => warn!(
                    "⚠️  Frame {}: could not load {} ({}), continuing without pixels",
                    raw.frame,
                    image_path.display(),
                    e
                ),
            }
        }

        let detections = raw
            .detections
            .into_iter()
            .map(|d| {
                let mask = match d.mask {
                    Some(m) => Mask::from_rle(m.width, m.height, &m.counts)?,
                    None => Mask::empty(0, 0),
                };
                Ok(Detection {
                    class_id: d.class_id,
                    bbox: d.bbox,
                    mask,
                    confidence: d.confidence,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((frame, detections))
    }
}

impl FrameSource for DetectionReader {
    fn next_frame(&mut self) -> Result<Option<(Frame, Vec<Detection>)>> {
        self.read_frame()
    }
}
