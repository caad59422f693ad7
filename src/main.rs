// src/main.rs

use anyhow::{Context, Result};
use icsi_correlator::collaborators::{DeferredScorer, SidecarClassifier};
use icsi_correlator::console::{OperatorConsole, StdinConsole};
use icsi_correlator::correlation::{CorrelatedRecord, CorrelationEngine, MatchStrategy};
use icsi_correlator::error::CorrelatorError;
use icsi_correlator::pipeline::{RunOutcome, RunSession};
use icsi_correlator::replay::{find_runs, DetectionReader, RunDirectory};
use icsi_correlator::report::RunReport;
use icsi_correlator::standardize::FeatureStandardizer;
use icsi_correlator::trajectory::TrajectoryStore;
use icsi_correlator::Config;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config_path = std::env::var("ICSI_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let mut config = Config::load_or_default(&config_path)?;
    config.apply_env_overrides()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("icsi_correlator={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🔬 ICSI Event Correlator Starting");
    info!("✓ Configuration loaded ({})", config_path);
    info!(
        "Engine: cooldown={} frames, dwell={:.1}s @ {} fps, match distance={:.1}px",
        config.engine.cooldown_frames,
        config.engine.dwell_seconds,
        config.engine.fps,
        config.trajectory.max_match_distance_px
    );

    let standardizer = FeatureStandardizer::from_config(&config.standardization)
        .context("Standardization table unusable")?;
    info!("✓ Standardization key {}", standardizer.key());

    let runs = find_runs(&config.run.input_dir);
    if runs.is_empty() {
        error!("No runs found in {}", config.run.input_dir);
        return Ok(());
    }

    fs::create_dir_all(&config.run.output_dir)
        .with_context(|| format!("Failed to create {}", config.run.output_dir))?;

    let mut engine = CorrelationEngine::new(
        &config,
        standardizer,
        Box::new(SidecarClassifier::new(Default::default())),
    );

    let mut console: Option<Box<dyn OperatorConsole>> =
        if config.manual.is_active() && config.manual.interactive {
            Some(Box::new(StdinConsole::spawn()))
        } else {
            None
        };

    for (idx, run) in runs.iter().enumerate() {
        info!("\n========================================");
        info!("Processing run {}/{}: {}", idx + 1, runs.len(), run.root.display());
        info!("========================================\n");

        match process_run(
            run,
            &config,
            &mut engine,
            console.as_mut().map(|c| &mut **c as &mut dyn OperatorConsole),
        ) {
            Ok(outcome) => {
                let s = &outcome.summary;
                info!("\n✓ Run processed successfully!");
                info!("  Total frames: {} ({:.1} fps)", s.total_frames, s.fps);
                info!("  Detections: {}", s.total_detections);
                info!("  Collisions: {}", s.collisions);
                info!("  🎯 Candidates selected: {}", s.selections);
                info!("  ⏱️  Dwell cycles: {}", s.dwell_starts);
                info!(
                    "  🚀 Records fired: {} ({} operator)",
                    s.records_fired, s.manual_captures
                );
                if s.pauses > 0 {
                    info!("  ⏸️  Pauses: {}", s.pauses);
                }

                if outcome.quit {
                    warn!("Operator quit, skipping remaining runs");
                    break;
                }
            }
            Err(e) => {
                error!("❌ Failed to process run {}: {:#}", run.name, e);
            }
        }
    }

    info!("\n🏁 All runs processed.");
    Ok(())
}

fn process_run<'a>(
    run: &RunDirectory,
    config: &'a Config,
    engine: &'a mut CorrelationEngine,
    console: Option<&'a mut dyn OperatorConsole>,
) -> Result<RunOutcome> {
    let mut store = TrajectoryStore::load(run.trajectories_path())
        .with_context(|| format!("Trajectory dataset for {}", run.name))?;

    if let MatchStrategy::Manual { ids } = engine.strategy() {
        let found = store.objects_with_ids(ids);
        info!(
            "🎯 Manual correlation: {}/{} selected identities present",
            found.len(),
            ids.len()
        );
    }

    engine.reset();
    engine.set_classifier(Box::new(SidecarClassifier::load(run.assessments_path())?));

    let mut reader = DetectionReader::open(run)?;

    let output_dir = Path::new(&config.run.output_dir);
    let records_path = output_dir.join(format!("{}_records.jsonl", run.name));
    let mut records_out = BufWriter::new(
        File::create(&records_path)
            .with_context(|| format!("Failed to create {}", records_path.display()))?,
    );
    info!("💾 Records: {}", records_path.display());

    let outcome = RunSession::new(config, engine, console).run(&mut reader, &mut store, |record| {
        save_record(&mut records_out, &records_path, record)
    })?;

    let report = RunReport::build(store.object_id(), &outcome.records, &DeferredScorer);
    let report_path = output_dir.join(format!("{}_report.json", run.name));
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;
    info!("💾 Report: {}", report_path.display());

    Ok(outcome)
}

fn save_record(
    out: &mut impl Write,
    path: &Path,
    record: &CorrelatedRecord,
) -> icsi_correlator::Result<()> {
    let line = serde_json::to_string(record).map_err(|e| CorrelatorError::io(path, e.into()))?;
    writeln!(out, "{}", line).map_err(|e| CorrelatorError::io(path, e))?;
    out.flush().map_err(|e| CorrelatorError::io(path, e))
}
