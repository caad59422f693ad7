// src/pipeline/session.rs
//
// Drives one run: pulls frames from a source, reconciles trajectory
// coordinates for them, steps the correlation engine, and applies operator
// commands between frames.
//
// Operator commands are applied before the frame they arrive on is
// correlated. While paused the session keeps polling without advancing
// the stream, so a paused session never skips frames.

use crate::config::Config;
use crate::console::{OperatorCommand, OperatorConsole};
use crate::correlation::{CorrelatedRecord, CorrelationEngine};
use crate::error::Result;
use crate::pipeline::frame_context::FrameContext;
use crate::pipeline::metrics::{MetricsSummary, RunMetrics};
use crate::replay::FrameSource;
use crate::trajectory::{CoordinateReconciler, TrajectoryStore};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct RunOutcome {
    pub records: Vec<CorrelatedRecord>,
    pub summary: MetricsSummary,
    /// The operator asked to stop; later runs should not start
    pub quit: bool,
}

pub struct RunSession<'a> {
    config: &'a Config,
    engine: &'a mut CorrelationEngine,
    console: Option<&'a mut dyn OperatorConsole>,
    reconciler: CoordinateReconciler,
    metrics: RunMetrics,
}

enum ConsoleFlow {
    Continue,
    Quit,
}

impl<'a> RunSession<'a> {
    pub fn new(
        config: &'a Config,
        engine: &'a mut CorrelationEngine,
        console: Option<&'a mut dyn OperatorConsole>,
    ) -> Self {
        Self {
            reconciler: CoordinateReconciler::from_config(&config.trajectory),
            config,
            engine,
            console,
            metrics: RunMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Replay `source` to the end (or until the operator quits). Each fired
    /// record is handed to `on_record` as soon as it exists.
    pub fn run<S, F>(
        &mut self,
        source: &mut S,
        store: &mut TrajectoryStore,
        mut on_record: F,
    ) -> Result<RunOutcome>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&CorrelatedRecord) -> Result<()>,
    {
        let mut records = Vec::new();
        let mut last: Option<FrameContext> = None;
        let mut quit = false;

        loop {
            if let ConsoleFlow::Quit = self.poll_console(last.as_ref(), &mut records, &mut on_record)? {
                quit = true;
                break;
            }

            let Some((frame, detections)) = source.next_frame()? else {
                break;
            };
            let (index, width, height) = (frame.index, frame.width, frame.height);

            // Positions for the lagged lookup must be in pixel space too
            if let Some(previous) = index.checked_sub(1) {
                store.reconcile_frame(previous, &self.reconciler, width, height);
            }
            store.reconcile_frame(index, &self.reconciler, width, height);

            let ctx = FrameContext::new(frame, detections, &self.config.classes);
            self.metrics.record_frame(ctx.detections().len());

            if let Some(record) = self.engine.process_frame(&ctx, store) {
                on_record(&record)?;
                records.push(record);
            }
            self.drain_events();

            if index > 0 && index % 300 == 0 {
                debug!("Frame {} ({:.1} fps)", index, self.metrics.fps());
            }
            last = Some(ctx);
        }

        let summary = self.metrics.summary();
        info!(
            "✓ Run finished: {} frames, {} record(s){}",
            summary.total_frames,
            records.len(),
            if quit { " (stopped by operator)" } else { "" }
        );

        Ok(RunOutcome {
            records,
            summary,
            quit,
        })
    }

    fn drain_events(&mut self) {
        for event in self.engine.drain_events() {
            self.metrics.observe(&event);
        }
    }

    /// Apply every pending command. While paused, keep polling until the
    /// operator resumes, quits, or the console goes away.
    fn poll_console<F>(
        &mut self,
        last: Option<&FrameContext>,
        records: &mut Vec<CorrelatedRecord>,
        on_record: &mut F,
    ) -> Result<ConsoleFlow>
    where
        F: FnMut(&CorrelatedRecord) -> Result<()>,
    {
        let Some(console) = self.console.as_deref_mut() else {
            return Ok(ConsoleFlow::Continue);
        };
        let frame = last.map(FrameContext::index).unwrap_or(0);
        let poll_interval = Duration::from_millis(self.config.manual.poll_interval_ms);

        loop {
            let command = console.poll();
            match command {
                Some(OperatorCommand::Quit) => {
                    info!("🛑 Quit requested at frame {}", frame);
                    return Ok(ConsoleFlow::Quit);
                }
                Some(OperatorCommand::Pause) => self.engine.pause(frame),
                Some(OperatorCommand::Resume) => self.engine.resume(frame),
                Some(OperatorCommand::SendNow) => match last {
                    Some(ctx) => {
                        info!("📸 Send-now requested at frame {}", frame);
                        if let Some(record) = self.engine.send_now(ctx) {
                            on_record(&record)?;
                            records.push(record);
                        }
                    }
                    None => warn!("⚠️  Send-now ignored: no frame seen yet"),
                },
                None => {}
            }
            for event in self.engine.drain_events() {
                self.metrics.observe(&event);
            }

            if command.is_some() {
                continue;
            }
            if !self.engine.is_paused() {
                return Ok(ConsoleFlow::Continue);
            }
            if console.is_closed() {
                warn!("⚠️  Operator console closed while paused, resuming");
                self.engine.resume(frame);
                for event in self.engine.drain_events() {
                    self.metrics.observe(&event);
                }
                return Ok(ConsoleFlow::Continue);
            }
            thread::sleep(poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{ClassifierResponse, SnapshotClassifier};
    use crate::console::ScriptedConsole;
    use crate::correlation::FireTrigger;
    use crate::snapshot::Snapshot;
    use crate::standardize::{FeatureStandardizer, StatsTable};
    use crate::trajectory::store::tests::stationary;
    use crate::types::{Detection, Frame, Mask, NormBox};
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    const W: u32 = 640;
    const H: u32 = 512;

    struct NoTarget;

    impl SnapshotClassifier for NoTarget {
        fn classify(&self, _frame: u64, _snapshot: Option<&Snapshot>) -> Option<ClassifierResponse> {
            None
        }
    }

    fn engine(config: &Config) -> CorrelationEngine {
        let mut table = StatsTable::default();
        table.insert("k", BTreeMap::new());
        CorrelationEngine::new(
            config,
            FeatureStandardizer::new(&table, "k").unwrap(),
            Box::new(NoTarget),
        )
    }

    fn det(class_id: u32, x0: f64, y0: f64, x1: f64, y1: f64, mask: Mask) -> Detection {
        Detection {
            class_id,
            bbox: NormBox::new(x0 / W as f64, y0 / H as f64, x1 / W as f64, y1 / H as f64),
            mask,
            confidence: 0.9,
        }
    }

    fn motile() -> Detection {
        det(0, 90.0, 90.0, 110.0, 110.0, Mask::empty(8, 8))
    }

    /// Tip at frame (104, 92), entering from the right.
    fn needle() -> Detection {
        let mask = Mask::from_fn(320, 256, |x, y| x >= 52 && (46..49).contains(&y));
        det(1, 104.0, 92.0, 639.0, 104.0, mask)
    }

    fn target() -> Detection {
        det(4, 300.0, 200.0, 500.0, 400.0, Mask::empty(8, 8))
    }

    fn tool() -> Detection {
        det(5, 450.0, 250.0, 600.0, 270.0, Mask::empty(8, 8))
    }

    /// Selection at frame 20, then target and tool from frame 30.
    fn frames(last: u64) -> Vec<(Frame, Vec<Detection>)> {
        (0..=last)
            .map(|i| {
                let detections = match i {
                    20 => vec![needle(), motile()],
                    30.. => vec![target(), tool()],
                    _ => vec![motile()],
                };
                (Frame::new(i, W, H), detections)
            })
            .collect()
    }

    fn store() -> TrajectoryStore {
        TrajectoryStore::new(None, vec![stationary(7, 0, 200, 100.0, 100.0)])
    }

    #[test]
    fn test_replay_fires_one_record() {
        let config = Config::default();
        let mut engine = engine(&config);
        let mut store = store();
        let mut seen = 0;

        let mut source = frames(150).into_iter();
        let outcome = RunSession::new(&config, &mut engine, None)
            .run(&mut source, &mut store, |_| {
                seen += 1;
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, 1);
        assert!(!outcome.quit);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.frame, 121);
        assert_eq!(record.candidate.id, Some(7));
        assert_eq!(record.trigger, FireTrigger::Dwell);
        assert_eq!(outcome.summary.total_frames, 151);
        assert_eq!(outcome.summary.selections, 1);
        assert_eq!(outcome.summary.records_fired, 1);
    }

    #[test]
    fn test_quit_stops_before_next_frame() {
        let config = Config::default();
        let mut engine = engine(&config);
        let mut store = store();
        let mut console = ScriptedConsole::new([None, None, Some(OperatorCommand::Quit)]);

        let mut source = frames(150).into_iter();
        let outcome = RunSession::new(&config, &mut engine, Some(&mut console as &mut dyn OperatorConsole))
            .run(&mut source, &mut store, |_| Ok(()))
            .unwrap();

        assert!(outcome.quit);
        assert_eq!(outcome.summary.total_frames, 2);
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn test_send_now_from_console() {
        let config = Config::default();
        let mut engine = engine(&config);
        let mut store = store();

        // One empty poll per frame up to frame 40, then send-now
        let mut script: Vec<Option<OperatorCommand>> = vec![None; 41];
        script.push(Some(OperatorCommand::SendNow));
        let mut console = ScriptedConsole::new(script);

        let mut source = frames(150).into_iter();
        let outcome = RunSession::new(&config, &mut engine, Some(&mut console as &mut dyn OperatorConsole))
            .run(&mut source, &mut store, |_| Ok(()))
            .unwrap();

        // The operator capture replaces the dwell capture for this cycle
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].trigger, FireTrigger::Operator);
        assert_eq!(outcome.records[0].frame, 40);
        assert_eq!(outcome.summary.manual_captures, 1);
    }

    #[test]
    fn test_paused_console_closing_resumes() {
        let config = Config::default();
        let mut engine = engine(&config);
        let mut store = store();
        let mut console = ScriptedConsole::new([Some(OperatorCommand::Pause)]);

        let mut source = frames(150).into_iter();
        let outcome = RunSession::new(&config, &mut engine, Some(&mut console as &mut dyn OperatorConsole))
            .run(&mut source, &mut store, |_| Ok(()))
            .unwrap();

        assert_eq!(outcome.summary.pauses, 1);
        assert_eq!(outcome.summary.total_frames, 151);
        assert_eq!(outcome.records.len(), 1);
    }

    /// Counts frames pulled from the wrapped source.
    struct CountingSource {
        inner: std::vec::IntoIter<(Frame, Vec<Detection>)>,
        reads: Rc<Cell<u64>>,
    }

    impl FrameSource for CountingSource {
        fn next_frame(&mut self) -> Result<Option<(Frame, Vec<Detection>)>> {
            let next = self.inner.next();
            if next.is_some() {
                self.reads.set(self.reads.get() + 1);
            }
            Ok(next)
        }
    }

    /// Notes how many frames had been read at every poll.
    struct WatchingConsole {
        script: ScriptedConsole,
        reads: Rc<Cell<u64>>,
        seen: Vec<u64>,
    }

    impl OperatorConsole for WatchingConsole {
        fn poll(&mut self) -> Option<OperatorCommand> {
            self.seen.push(self.reads.get());
            self.script.poll()
        }

        fn is_closed(&self) -> bool {
            self.script.is_closed()
        }
    }

    #[test]
    fn test_pause_holds_the_stream() {
        let mut config = Config::default();
        config.manual.poll_interval_ms = 1;
        let mut engine = engine(&config);
        let mut store = store();

        let reads = Rc::new(Cell::new(0));
        let mut source = CountingSource {
            inner: frames(150).into_iter(),
            reads: reads.clone(),
        };

        // Five frames, pause, several empty polls, resume
        let mut script: Vec<Option<OperatorCommand>> = vec![None; 5];
        script.push(Some(OperatorCommand::Pause));
        script.extend(vec![None; 4]);
        script.push(Some(OperatorCommand::Resume));
        let mut console = WatchingConsole {
            script: ScriptedConsole::new(script),
            reads: reads.clone(),
            seen: Vec::new(),
        };

        let outcome = RunSession::new(&config, &mut engine, Some(&mut console as &mut dyn OperatorConsole))
            .run(&mut source, &mut store, |_| Ok(()))
            .unwrap();

        // Polls 5..=10 cover the pause command, the empty polls and the resume
        assert_eq!(&console.seen[..5], &[0, 1, 2, 3, 4]);
        assert!(console.seen[5..=10].iter().all(|&n| n == 5), "{:?}", &console.seen[..12]);
        assert_eq!(console.seen[11], 5);
        assert_eq!(console.seen[12], 6);

        assert_eq!(outcome.summary.pauses, 1);
        assert_eq!(outcome.summary.total_frames, 151);
        assert_eq!(reads.get(), 151);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].frame, 121);
    }
}
