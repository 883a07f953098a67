//! Test orchestration — one active test at a time, an append-only result
//! log, statistics and export.
//!
//! Data flow per sample:
//! gaze sample → `RegionTracker::update` → enter/exit events →
//! active test `on_region` (only when the region changed) → `tick`.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::calibration::CalibrationStore;
use crate::clock::{Clock, Timestamp};
use crate::error::{HarnessError, Result};
use crate::events::{DisplaySnapshot, EventBus, HarnessEvent, SnapshotHandle};
use crate::export::{self, ResultRow};
use crate::gaze::GazePoint;
use crate::interaction::{DwellTest, InteractionTest, SequenceTest, TestResult};
use crate::region::{Region, RegionTracker};

/// Aggregates over the result log. All zero when the log is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TestStatistics {
    pub total_tests: usize,
    pub success_rate: f64,
    pub average_accuracy: f64,
    pub average_duration: f64,
}

impl TestStatistics {
    pub fn from_results(results: &[TestResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }
        let n = results.len() as f64;
        let successes = results.iter().filter(|r| r.success).count() as f64;
        Self {
            total_tests: results.len(),
            success_rate: successes / n,
            average_accuracy: results.iter().map(|r| r.accuracy).sum::<f64>() / n,
            average_duration: results.iter().map(|r| r.duration_s).sum::<f64>() / n,
        }
    }
}

/// Owns the tracker, the calibration store and the single active test.
pub struct TestOrchestrator {
    tracker: RegionTracker,
    calibration: CalibrationStore,
    clock: Arc<dyn Clock>,
    epoch: Instant,
    rng: StdRng,
    active: Option<InteractionTest>,
    results: Vec<TestResult>,
    last_gaze: Option<GazePoint>,
    events: EventBus,
    snapshot: SnapshotHandle,
}

impl TestOrchestrator {
    /// `seed` fixes sequence generation; `None` draws from entropy.
    pub fn new(tracker: RegionTracker, clock: Arc<dyn Clock>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let epoch = clock.now();
        Self {
            tracker,
            calibration: CalibrationStore::new(clock.clone()),
            clock,
            epoch,
            rng,
            active: None,
            results: Vec::new(),
            last_gaze: None,
            events: EventBus::new(),
            snapshot: SnapshotHandle::new(),
        }
    }

    /// Current reading of the orchestrator's clock.
    pub fn now(&self) -> Timestamp {
        Timestamp::read(self.clock.as_ref(), self.epoch)
    }

    // ── Test factories ──────────────────────────────────────

    pub fn create_dwell_test(
        &self,
        target_id: usize,
        dwell_s: f64,
        timeout_s: Option<f64>,
    ) -> Result<InteractionTest> {
        let target = self
            .tracker
            .grid()
            .get(target_id)
            .ok_or(HarnessError::UnknownRegion(target_id))?;
        Ok(DwellTest::new(target.clone(), dwell_s, timeout_s)?.into())
    }

    /// Sequence over all grid regions, drawn from the orchestrator's RNG.
    pub fn create_sequence_test(&mut self, length: usize) -> Result<InteractionTest> {
        let test = SequenceTest::new(self.tracker.grid().regions(), length, &mut self.rng)?;
        Ok(test.into())
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Make `test` the active test and start it.
    ///
    /// Fails with `ConcurrentTestConflict` if another test is running; the
    /// running test is left untouched.
    pub fn run_test(&mut self, mut test: InteractionTest) -> Result<()> {
        if let Some(active) = &self.active {
            return Err(HarnessError::ConcurrentTestConflict {
                active: active.kind().label(),
                requested: test.kind().label(),
            });
        }

        let now = self.now();
        test.start(now);
        self.events.emit(HarnessEvent::TestStarted {
            kind: test.kind(),
            instruction: test.instruction(),
        });
        // The gaze may already rest somewhere; tests only hear about changes.
        test.on_region(self.tracker.current(), now);
        self.active = Some(test);
        self.collect_if_terminal();
        Ok(())
    }

    pub fn active_test(&self) -> Option<&InteractionTest> {
        self.active.as_ref()
    }

    pub fn has_active_test(&self) -> bool {
        self.active.is_some()
    }

    /// Abort the active test. No result is recorded.
    pub fn stop_active_test(&mut self) -> Result<InteractionTest> {
        let mut test = self.active.take().ok_or(HarnessError::NoActiveTest)?;
        test.stop();
        info!("{} aborted", test.kind().label());
        self.publish_snapshot();
        Ok(test)
    }

    /// End the active test now and record whatever it has achieved.
    pub fn force_complete_active(&mut self) -> Result<TestResult> {
        let now = self.now();
        let test = self.active.as_mut().ok_or(HarnessError::NoActiveTest)?;
        test.force_complete(now);
        self.collect_if_terminal().ok_or(HarnessError::NoActiveTest)
    }

    /// Fail the active test after a source error. Never propagates.
    pub fn fail_active(&mut self, reason: &str) {
        if self.active.is_none() {
            return;
        }
        warn!("Failing active test: {}", reason);
        if let Err(e) = self.force_complete_active() {
            warn!("Could not complete active test: {}", e);
        }
    }

    // ── Sample / tick path ──────────────────────────────────

    /// Feed one gaze sample (or its absence), then run a tick.
    pub fn on_gaze_sample(&mut self, point: Option<GazePoint>) {
        let now = self.now();
        self.last_gaze = point;
        let change = self.tracker.update(point.as_ref(), now.mono_s);

        if change.changed() {
            if let Some(exited) = change.exited() {
                self.events.emit(HarnessEvent::RegionExited(exited.clone()));
            }
            if let Some(entered) = change.entered() {
                self.events.emit(HarnessEvent::RegionEntered(entered.clone()));
            }
            if let Some(test) = self.active.as_mut() {
                test.on_region(change.current.as_ref(), now);
            }
            self.collect_if_terminal();
        }

        self.tick_at(now);
    }

    /// Evaluate timers of the active test and notify the display.
    pub fn tick(&mut self) {
        let now = self.now();
        self.tick_at(now);
    }

    fn tick_at(&mut self, now: Timestamp) {
        if let Some(test) = self.active.as_mut() {
            test.on_tick(now);
        }
        self.collect_if_terminal();

        self.events.emit(HarnessEvent::Frame {
            current_region: self.tracker.current().cloned(),
            last_gaze: self.last_gaze,
        });
        self.publish_snapshot();
    }

    /// Move a finished test's result into the log.
    fn collect_if_terminal(&mut self) -> Option<TestResult> {
        if !self.active.as_ref().is_some_and(|t| t.is_terminal()) {
            return None;
        }
        let test = self.active.take()?;
        let result = test.result()?.clone();
        self.on_test_completed(result.clone());
        Some(result)
    }

    /// Append a completed result to the log and announce it.
    pub fn on_test_completed(&mut self, result: TestResult) {
        info!(
            "{} completed: success={} accuracy={:.0}% duration={:.2}s",
            result.kind.label(),
            result.success,
            result.accuracy * 100.0,
            result.duration_s
        );
        self.results.push(result.clone());
        self.events.emit(HarnessEvent::TestCompleted(result));
    }

    fn publish_snapshot(&self) {
        let now = self.now();
        self.snapshot.publish(DisplaySnapshot {
            current_region: self.tracker.current().cloned(),
            last_gaze: self.last_gaze,
            active_test: self.active.as_ref().map(|t| t.kind()),
            instruction: self.active.as_ref().map(|t| t.instruction()),
            progress: self.active.as_ref().map(|t| t.progress(now)).unwrap_or(0.0),
            completed_tests: self.results.len(),
        });
    }

    // ── Results ─────────────────────────────────────────────

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn statistics(&self) -> TestStatistics {
        TestStatistics::from_results(&self.results)
    }

    /// One row per result, in completion order.
    pub fn export_results(&self) -> Vec<ResultRow> {
        self.results.iter().map(ResultRow::from).collect()
    }

    pub fn write_results(&self, path: &Path) -> Result<()> {
        export::write_results(path, &self.export_results())
    }

    // ── Accessors ───────────────────────────────────────────

    pub fn tracker(&self) -> &RegionTracker {
        &self.tracker
    }

    pub fn current_region(&self) -> Option<&Region> {
        self.tracker.current()
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    pub fn calibration_mut(&mut self) -> &mut CalibrationStore {
        &mut self.calibration
    }

    pub fn subscribe(&mut self) -> std::sync::mpsc::Receiver<HarnessEvent> {
        self.events.subscribe()
    }

    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.snapshot.clone()
    }

    /// Abort any active test and forget tracking state. Results and
    /// calibration samples are kept.
    pub fn reset_tracking(&mut self) {
        if let Some(mut test) = self.active.take() {
            test.stop();
        }
        self.tracker.reset();
        self.last_gaze = None;
        self.publish_snapshot();
    }
}
