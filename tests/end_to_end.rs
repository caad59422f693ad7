// tests/end_to_end.rs
//
// Replays a small recorded run directory through the public API: discovery,
// dataset load, detection stream, correlation, report.

use icsi_correlator::collaborators::{DeferredScorer, SidecarClassifier};
use icsi_correlator::config::Config;
use icsi_correlator::correlation::{CorrelationEngine, FireTrigger};
use icsi_correlator::pipeline::RunSession;
use icsi_correlator::replay::{find_runs, DetectionReader};
use icsi_correlator::report::RunReport;
use icsi_correlator::standardize::FeatureStandardizer;
use icsi_correlator::trajectory::TrajectoryStore;
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::Path;

const W: u32 = 640;
const H: u32 = 512;
// Masks are at quarter resolution
const MW: usize = 160;
const MH: usize = 128;

/// Row-major run lengths, alternating background/foreground from background.
fn rle(on: impl Fn(usize, usize) -> bool) -> Vec<usize> {
    let mut counts = Vec::new();
    let mut current = false;
    let mut run = 0;
    for y in 0..MH {
        for x in 0..MW {
            if on(x, y) != current {
                counts.push(run);
                run = 0;
                current = !current;
            }
            run += 1;
        }
    }
    counts.push(run);
    counts
}

fn bbox(x0: f64, y0: f64, x1: f64, y1: f64) -> serde_json::Value {
    json!([x0 / W as f64, y0 / H as f64, x1 / W as f64, y1 / H as f64])
}

fn motile() -> serde_json::Value {
    json!({
        "class_id": 0,
        "bbox": bbox(240.0, 96.0, 260.0, 112.0),
        "confidence": 0.8,
        "mask": { "width": MW, "height": MH, "counts": rle(|x, y| (61..65).contains(&x) && (25..28).contains(&y)) }
    })
}

/// Enters from the right; tip at mask (60, 24), frame (240, 96).
fn needle() -> serde_json::Value {
    json!({
        "class_id": 1,
        "bbox": bbox(240.0, 96.0, 639.0, 104.0),
        "confidence": 0.9,
        "mask": { "width": MW, "height": MH, "counts": rle(|x, y| x >= 60 && (24..26).contains(&y)) }
    })
}

fn target() -> serde_json::Value {
    json!({ "class_id": 4, "bbox": bbox(300.0, 200.0, 500.0, 400.0), "confidence": 0.95 })
}

fn tool() -> serde_json::Value {
    json!({ "class_id": 5, "bbox": bbox(450.0, 250.0, 600.0, 270.0), "confidence": 0.95 })
}

fn write_run(dir: &Path) {
    fs::create_dir_all(dir).unwrap();

    let positions: Vec<_> = (0..=200).map(|f| json!([f, 250.3, 104.2])).collect();
    let far: Vec<_> = (0..=200).map(|f| json!([f, 500.0, 400.0])).collect();
    let dataset = json!({
        "objectId": "video-42",
        "objects": {
            "3": { "id": 3, "initialFrame": 0, "finalFrame": 200, "positions": positions,
                   "motilityParameters": { "VSL": 21.5, "VCL": 48.0, "LIN": 0.45, "ALH": 2.1, "MAD": 33.0 },
                   "score": 0.9 },
            "5": { "id": 5, "initialFrame": 0, "finalFrame": 200, "positions": far,
                   "motilityParameters": {}, "score": 0.2 }
        }
    });
    fs::write(dir.join("trajectories.json"), dataset.to_string()).unwrap();

    let mut stream = fs::File::create(dir.join("detections.jsonl")).unwrap();
    for frame in 0..=150u64 {
        let detections = match frame {
            0..=9 => vec![motile()],
            10 => vec![needle(), motile()],
            11..=19 => vec![needle()],
            _ => vec![target(), tool()],
        };
        let line = json!({ "frame": frame, "width": W, "height": H, "detections": detections });
        writeln!(stream, "{}", line).unwrap();
    }

    let assessments = json!({
        "111": { "oocytes": [ { "masks": { "cyto": [] }, "features": { "cyto_area": 5210.5 }, "blasto_probability": 0.64 } ] }
    });
    fs::write(dir.join("assessments.json"), assessments.to_string()).unwrap();
}

fn standardizer(dir: &Path, config: &mut Config) -> FeatureStandardizer {
    let key = config.standardization.configuration_key();
    let mut table = serde_json::Map::new();
    table.insert(
        key,
        json!({ "area_mean": { "lambda": 1.0, "mean": 0.0, "scale": 1.0 } }),
    );
    let path = dir.join("stats.json");
    fs::write(&path, serde_json::Value::Object(table).to_string()).unwrap();
    config.standardization.table_path = path.to_string_lossy().into_owned();
    FeatureStandardizer::from_config(&config.standardization).unwrap()
}

#[test]
fn test_replayed_run_produces_one_scored_record() {
    let root = tempfile::tempdir().unwrap();
    write_run(&root.path().join("runs").join("session_a"));

    let mut config = Config::default();
    let standardizer = standardizer(root.path(), &mut config);

    let runs = find_runs(root.path().join("runs"));
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.name, "session_a");

    let mut store = TrajectoryStore::load(run.trajectories_path()).unwrap();
    assert_eq!(store.object_id(), Some("video-42"));

    let classifier = SidecarClassifier::load(run.assessments_path()).unwrap();
    let mut engine = CorrelationEngine::new(&config, standardizer, Box::new(classifier));
    let mut reader = DetectionReader::open(run).unwrap();

    let mut streamed = Vec::new();
    let outcome = RunSession::new(&config, &mut engine, None)
        .run(&mut reader, &mut store, |record| {
            streamed.push(record.frame);
            Ok(())
        })
        .unwrap();

    // Dwell starts at 20 and fires once it has lasted more than 90 frames
    assert_eq!(streamed, vec![111]);
    assert_eq!(outcome.summary.total_frames, 151);
    assert_eq!(outcome.summary.selections, 1);

    let record = &outcome.records[0];
    assert_eq!(record.trigger, FireTrigger::Dwell);
    assert_eq!(record.candidate.id, Some(3));
    assert_eq!(record.candidate.initial_frame, Some(0));
    assert_eq!(record.candidate.frame, Some(10));
    assert!(record.candidate.match_distance.unwrap() < 1e-9);
    assert!((record.candidate.motility.vsl - 21.5).abs() < 1e-12);

    let raw = record.candidate.morphology.unwrap();
    let standardized = record.candidate.standardized_morphology.unwrap();
    assert!(raw.area > 0.0);
    // Identity statistics for area, everything else passes through
    assert!((standardized.area - raw.area).abs() < 1e-9);
    assert_eq!(standardized.perimeter, raw.perimeter);
    assert!(record.is_usable());

    let report = RunReport::build(store.object_id(), &outcome.records, &DeferredScorer);
    assert_eq!(report.candidates.len(), 1);
    assert_eq!(report.dropped_records, 0);
    assert_eq!(report.targets[0].frame, 111);
    assert_eq!(report.targets[0].features.cyto_area, 5210.5);
    assert_eq!(report.targets[0].blasto_probability, Some(0.64));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["objectId"], "video-42");
    assert_eq!(json["candidates"][0]["id"], 3);
    assert_eq!(json["scores"], json!([null]));
}

#[test]
fn test_engine_reset_between_runs() {
    let root = tempfile::tempdir().unwrap();
    write_run(&root.path().join("runs").join("a"));
    write_run(&root.path().join("runs").join("b"));

    let mut config = Config::default();
    let standardizer = standardizer(root.path(), &mut config);
    let mut engine = CorrelationEngine::new(
        &config,
        standardizer,
        Box::new(SidecarClassifier::new(Default::default())),
    );

    let mut fired = Vec::new();
    for run in find_runs(root.path().join("runs")) {
        engine.reset();
        engine.set_classifier(Box::new(SidecarClassifier::load(run.assessments_path()).unwrap()));
        let mut store = TrajectoryStore::load(run.trajectories_path()).unwrap();
        let mut reader = DetectionReader::open(&run).unwrap();
        let outcome = RunSession::new(&config, &mut engine, None)
            .run(&mut reader, &mut store, |_| Ok(()))
            .unwrap();
        fired.extend(outcome.records.iter().map(|r| (run.name.clone(), r.frame)));
    }

    assert_eq!(fired, vec![("a".to_string(), 111), ("b".to_string(), 111)]);
}
