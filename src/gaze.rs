//! Gaze sources — the sample type, the provider contract, and the
//! providers used for scripted tests, simulation and cross-thread hand-off.
//!
//! Nothing here estimates gaze. A real estimator plugs in by implementing
//! `GazeProvider`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{HarnessError, Result};

// ── Gaze point ──────────────────────────────────────────────

/// A single on-screen gaze estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazePoint {
    pub screen_x: f64,
    pub screen_y: f64,
    /// Confidence [0.0, 1.0].
    pub confidence: f64,
    pub timestamp_s: f64,
}

// ── Provider contract ───────────────────────────────────────

/// Source of gaze samples.
///
/// `poll` may be called at any rate. Between arrivals it returns the last
/// known sample again rather than an error.
pub trait GazeProvider: Send {
    /// Bring the source up. Failure means tracking never starts.
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Latest sample, or `None` when no gaze is available.
    fn poll(&mut self) -> Result<Option<GazePoint>>;
}

// ── Scripted source ─────────────────────────────────────────

/// One step of a scripted gaze trace.
#[derive(Debug, Clone)]
pub enum ScriptedSample {
    /// Publish this sample (or "no gaze").
    Sample(Option<GazePoint>),
    /// Fail the poll with a disconnect.
    Disconnect(String),
}

/// Delivers a pre-defined trace, one step per poll, then repeats the last sample.
pub struct ScriptedGazeSource {
    steps: VecDeque<ScriptedSample>,
    last: Option<GazePoint>,
    fail_init: Option<String>,
}

impl ScriptedGazeSource {
    pub fn new(samples: Vec<Option<GazePoint>>) -> Self {
        Self {
            steps: samples.into_iter().map(ScriptedSample::Sample).collect(),
            last: None,
            fail_init: None,
        }
    }

    pub fn from_steps(steps: Vec<ScriptedSample>) -> Self {
        Self {
            steps: VecDeque::from(steps),
            last: None,
            fail_init: None,
        }
    }

    /// Make `initialize` fail with the given reason.
    pub fn failing_init(mut self, reason: &str) -> Self {
        self.fail_init = Some(reason.to_string());
        self
    }

    /// Number of scripted steps not yet delivered.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl GazeProvider for ScriptedGazeSource {
    fn initialize(&mut self) -> Result<()> {
        match &self.fail_init {
            Some(reason) => Err(HarnessError::InitializationFailure(reason.clone())),
            None => Ok(()),
        }
    }

    fn poll(&mut self) -> Result<Option<GazePoint>> {
        match self.steps.pop_front() {
            Some(ScriptedSample::Sample(sample)) => {
                self.last = sample;
                Ok(sample)
            }
            Some(ScriptedSample::Disconnect(reason)) => {
                self.last = None;
                Err(HarnessError::SourceDisconnected(reason))
            }
            None => Ok(self.last),
        }
    }
}

// ── Recording wrapper ───────────────────────────────────────

/// Records every sample an inner provider hands out.
pub struct RecordingProvider<P: GazeProvider> {
    inner: P,
    recorded: Vec<Option<GazePoint>>,
}

impl<P: GazeProvider> RecordingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            recorded: Vec::new(),
        }
    }

    pub fn recorded(&self) -> &[Option<GazePoint>] {
        &self.recorded
    }

    pub fn into_recorded(self) -> Vec<Option<GazePoint>> {
        self.recorded
    }
}

impl<P: GazeProvider> GazeProvider for RecordingProvider<P> {
    fn initialize(&mut self) -> Result<()> {
        self.inner.initialize()
    }

    fn poll(&mut self) -> Result<Option<GazePoint>> {
        let sample = self.inner.poll()?;
        self.recorded.push(sample);
        Ok(sample)
    }
}

// ── Simulated source ────────────────────────────────────────

/// Development stand-in: fixates each target in turn with random jitter.
pub struct SimulatedGazeSource {
    clock: Arc<dyn Clock>,
    targets: Vec<(f64, f64)>,
    /// Seconds spent on each target before the next saccade.
    pub fixation_s: f64,
    /// Maximum jitter in pixels around the target.
    pub jitter_px: f64,
    pub confidence: f64,
    rng: StdRng,
    started_unix_s: Option<f64>,
}

impl SimulatedGazeSource {
    pub fn new(clock: Arc<dyn Clock>, targets: Vec<(f64, f64)>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            clock,
            targets,
            fixation_s: 2.5,
            jitter_px: 20.0,
            confidence: 0.85,
            rng,
            started_unix_s: None,
        }
    }

    fn target_at(&self, elapsed_s: f64) -> (f64, f64) {
        let index = (elapsed_s / self.fixation_s).floor() as usize % self.targets.len();
        self.targets[index]
    }
}

impl GazeProvider for SimulatedGazeSource {
    fn initialize(&mut self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(HarnessError::InitializationFailure(
                "simulated source has no fixation targets".to_string(),
            ));
        }
        if !(self.fixation_s > 0.0) {
            return Err(HarnessError::InitializationFailure(format!(
                "fixation time must be positive, got {}",
                self.fixation_s
            )));
        }
        self.started_unix_s = Some(self.clock.unix_secs());
        info!("Simulated gaze source ready ({} targets)", self.targets.len());
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<GazePoint>> {
        let Some(started) = self.started_unix_s else {
            return Ok(None);
        };
        let now = self.clock.unix_secs();
        let (tx, ty) = self.target_at((now - started).max(0.0));
        let jitter = self.jitter_px.max(0.0);
        let (dx, dy) = if jitter > 0.0 {
            (
                self.rng.gen_range(-jitter..=jitter),
                self.rng.gen_range(-jitter..=jitter),
            )
        } else {
            (0.0, 0.0)
        };
        Ok(Some(GazePoint {
            screen_x: tx + dx,
            screen_y: ty + dy,
            confidence: self.confidence,
            timestamp_s: now,
        }))
    }
}

// ── Cross-thread hand-off ───────────────────────────────────

/// Single-slot mailbox holding the most recently published sample.
///
/// A producer thread writes; the tick loop reads. Reads never block on
/// new data and return the same sample until the next publish.
#[derive(Clone, Default)]
pub struct LatestSample {
    slot: Arc<Mutex<SlotState>>,
}

#[derive(Default)]
struct SlotState {
    sample: Option<GazePoint>,
    error: Option<String>,
}

impl LatestSample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, sample: Option<GazePoint>) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.sample = sample;
        }
    }

    /// Record a producer failure; the next poll reports it once.
    pub fn publish_error(&self, reason: String) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.sample = None;
            slot.error = Some(reason);
        }
    }
}

impl GazeProvider for LatestSample {
    fn poll(&mut self) -> Result<Option<GazePoint>> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| HarnessError::SourceDisconnected("sample slot poisoned".to_string()))?;
        if let Some(reason) = slot.error.take() {
            return Err(HarnessError::SourceDisconnected(reason));
        }
        Ok(slot.sample)
    }
}

/// Handle to a producer thread started by `spawn_producer`.
pub struct ProducerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ProducerHandle {
    /// Ask the producer to stop and wait for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Gaze producer thread panicked");
            }
        }
    }
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Initialize `source` on the caller's thread, then publish its samples
/// into `slot` from a background thread every `interval`.
pub fn spawn_producer<P>(mut source: P, slot: LatestSample, interval: Duration) -> Result<ProducerHandle>
where
    P: GazeProvider + 'static,
{
    source.initialize()?;
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let thread = thread::Builder::new()
        .name("gaze-producer".to_string())
        .spawn(move || {
            debug!("Gaze producer started ({}ms interval)", interval.as_millis());
            while !stop_flag.load(Ordering::SeqCst) {
                match source.poll() {
                    Ok(sample) => slot.publish(sample),
                    Err(e) => {
                        warn!("Gaze producer failed: {}", e);
                        slot.publish_error(e.to_string());
                        break;
                    }
                }
                thread::sleep(interval);
            }
            debug!("Gaze producer stopped");
        })?;

    Ok(ProducerHandle {
        stop,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;

    fn gp(x: f64, y: f64) -> GazePoint {
        GazePoint {
            screen_x: x,
            screen_y: y,
            confidence: 1.0,
            timestamp_s: 0.0,
        }
    }

    #[test]
    fn test_scripted_source_repeats_last() {
        let mut src = ScriptedGazeSource::new(vec![Some(gp(1.0, 2.0)), None, Some(gp(3.0, 4.0))]);
        assert_eq!(src.remaining(), 3);
        assert_eq!(src.poll().unwrap(), Some(gp(1.0, 2.0)));
        assert_eq!(src.poll().unwrap(), None);
        assert_eq!(src.poll().unwrap(), Some(gp(3.0, 4.0)));
        // Drained: idempotent last-known sample.
        assert_eq!(src.poll().unwrap(), Some(gp(3.0, 4.0)));
        assert_eq!(src.poll().unwrap(), Some(gp(3.0, 4.0)));
    }

    #[test]
    fn test_scripted_disconnect() {
        let mut src = ScriptedGazeSource::from_steps(vec![
            ScriptedSample::Sample(Some(gp(1.0, 1.0))),
            ScriptedSample::Disconnect("cable".to_string()),
        ]);
        assert!(src.poll().unwrap().is_some());
        assert!(matches!(src.poll(), Err(HarnessError::SourceDisconnected(_))));
        assert_eq!(src.poll().unwrap(), None);
    }

    #[test]
    fn test_scripted_init_failure() {
        let mut src = ScriptedGazeSource::new(vec![]).failing_init("no camera");
        assert!(matches!(src.initialize(), Err(HarnessError::InitializationFailure(_))));
    }

    #[test]
    fn test_recording_provider() {
        let inner = ScriptedGazeSource::new(vec![Some(gp(1.0, 1.0)), None]);
        let mut rec = RecordingProvider::new(inner);
        rec.poll().unwrap();
        rec.poll().unwrap();
        rec.poll().unwrap();
        assert_eq!(rec.recorded().len(), 3);
        assert_eq!(rec.into_recorded()[1], None);
    }

    #[test]
    fn test_simulated_source_cycles_targets() {
        let clock = Arc::new(TestClock::new());
        let mut sim = SimulatedGazeSource::new(
            clock.clone(),
            vec![(100.0, 100.0), (900.0, 500.0)],
            Some(7),
        );
        sim.jitter_px = 10.0;
        assert_eq!(sim.poll().unwrap(), None);
        sim.initialize().unwrap();

        let first = sim.poll().unwrap().unwrap();
        assert!((first.screen_x - 100.0).abs() <= 10.0);
        assert!((first.screen_y - 100.0).abs() <= 10.0);

        clock.advance_secs(3.0);
        let second = sim.poll().unwrap().unwrap();
        assert!((second.screen_x - 900.0).abs() <= 10.0);
        assert!((second.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_simulated_source_needs_targets() {
        let clock = Arc::new(TestClock::new());
        let mut sim = SimulatedGazeSource::new(clock, vec![], Some(1));
        assert!(matches!(sim.initialize(), Err(HarnessError::InitializationFailure(_))));
    }

    #[test]
    fn test_latest_sample_stale_reads() {
        let slot = LatestSample::new();
        let mut reader = slot.clone();
        assert_eq!(reader.poll().unwrap(), None);
        slot.publish(Some(gp(5.0, 5.0)));
        assert_eq!(reader.poll().unwrap(), Some(gp(5.0, 5.0)));
        assert_eq!(reader.poll().unwrap(), Some(gp(5.0, 5.0)));

        slot.publish_error("unplugged".to_string());
        assert!(reader.poll().is_err());
        assert_eq!(reader.poll().unwrap(), None);
    }

    #[test]
    fn test_producer_publishes() {
        let slot = LatestSample::new();
        let src = ScriptedGazeSource::new(vec![Some(gp(42.0, 24.0))]);
        let handle = spawn_producer(src, slot.clone(), Duration::from_millis(1)).unwrap();
        let mut reader = slot.clone();
        let mut seen = None;
        for _ in 0..200 {
            seen = reader.poll().unwrap();
            if seen.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        handle.stop();
        assert_eq!(seen, Some(gp(42.0, 24.0)));
    }

    #[test]
    fn test_producer_init_fails_fast() {
        let slot = LatestSample::new();
        let src = ScriptedGazeSource::new(vec![]).failing_init("no camera");
        assert!(matches!(
            spawn_producer(src, slot, Duration::from_millis(1)),
            Err(HarnessError::InitializationFailure(_))
        ));
    }
}
