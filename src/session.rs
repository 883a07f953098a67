//! Tracking session — the fixed-rate tick loop.
//!
//! Each tick pulls the most recent sample from the gaze provider, feeds
//! it to the orchestrator, and starts the next planned test when none is
//! active. Source failures are logged and fail the active test; they
//! never escape the loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{HarnessConfig, PlannedTest};
use crate::error::Result;
use crate::gaze::GazeProvider;
use crate::orchestrator::TestOrchestrator;

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// Every planned test has completed.
    PlanFinished,
    /// The shutdown flag was raised.
    Shutdown,
    /// The exit deadline passed.
    Deadline,
}

/// Drives an orchestrator from a gaze provider.
pub struct TrackingSession<P: GazeProvider> {
    provider: P,
    orchestrator: TestOrchestrator,
    plan: VecDeque<PlannedTest>,
    dwell_seconds: f64,
    dwell_timeout_seconds: f64,
    sequence_length: usize,
    pub tick_interval: Duration,
    started: bool,
    ticks: u64,
}

impl<P: GazeProvider> TrackingSession<P> {
    pub fn new(provider: P, orchestrator: TestOrchestrator, config: &HarnessConfig) -> Self {
        Self {
            provider,
            orchestrator,
            plan: config.plan.iter().cloned().collect(),
            dwell_seconds: config.tests.dwell_seconds,
            dwell_timeout_seconds: config.tests.dwell_timeout_seconds,
            sequence_length: config.tests.sequence_length,
            tick_interval: config.tracking.tick_interval(),
            started: false,
            ticks: 0,
        }
    }

    /// Bring up the gaze source. Fails fast; nothing is tracked on error.
    pub fn start(&mut self) -> Result<()> {
        self.provider.initialize()?;
        self.started = true;
        info!(
            "Tracking session started ({} planned test(s), tick {}ms)",
            self.plan.len(),
            self.tick_interval.as_millis()
        );
        Ok(())
    }

    /// Run a single tick.
    pub fn step(&mut self) {
        if !self.started {
            return;
        }
        self.ticks += 1;

        if !self.orchestrator.has_active_test() {
            self.start_next_planned();
        }

        match self.provider.poll() {
            Ok(sample) => self.orchestrator.on_gaze_sample(sample),
            Err(e) => {
                warn!("Gaze source error: {}", e);
                self.orchestrator.fail_active(&e.to_string());
                self.orchestrator.on_gaze_sample(None);
            }
        }
    }

    /// Tick until the plan is done, `shutdown` is raised, or `exit_after` elapses.
    pub fn run(&mut self, shutdown: &AtomicBool, exit_after: Option<Duration>) -> SessionExit {
        let deadline = exit_after.map(|d| Instant::now() + d);
        loop {
            if shutdown.load(Ordering::SeqCst) {
                info!("Shutdown requested after {} tick(s)", self.ticks);
                return SessionExit::Shutdown;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("Session deadline reached after {} tick(s)", self.ticks);
                return SessionExit::Deadline;
            }
            if self.plan_finished() {
                info!("Test plan finished after {} tick(s)", self.ticks);
                return SessionExit::PlanFinished;
            }

            self.step();
            std::thread::sleep(self.tick_interval);
        }
    }

    /// Nothing queued and nothing running.
    pub fn plan_finished(&self) -> bool {
        self.plan.is_empty() && !self.orchestrator.has_active_test()
    }

    /// Abort whatever is running and stop. The orchestrator stays usable.
    pub fn stop(&mut self) {
        if self.orchestrator.has_active_test() {
            if let Err(e) = self.orchestrator.stop_active_test() {
                warn!("Stopping active test failed: {}", e);
            }
        }
        self.plan.clear();
        self.started = false;
    }

    fn start_next_planned(&mut self) {
        while let Some(entry) = self.plan.pop_front() {
            let test = match entry {
                PlannedTest::Dwell {
                    target,
                    dwell_seconds,
                    timeout_seconds,
                } => self.orchestrator.create_dwell_test(
                    target,
                    dwell_seconds.unwrap_or(self.dwell_seconds),
                    Some(timeout_seconds.unwrap_or(self.dwell_timeout_seconds)),
                ),
                PlannedTest::Sequence { length } => self
                    .orchestrator
                    .create_sequence_test(length.unwrap_or(self.sequence_length)),
            };
            match test.and_then(|t| self.orchestrator.run_test(t)) {
                Ok(()) => return,
                Err(e) => warn!("Skipping planned test: {}", e),
            }
        }
    }

    pub fn orchestrator(&self) -> &TestOrchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut TestOrchestrator {
        &mut self.orchestrator
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn into_orchestrator(self) -> TestOrchestrator {
        self.orchestrator
    }
}
