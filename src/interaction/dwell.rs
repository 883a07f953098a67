//! Region dwell test — hold gaze on one region for a required time.
//!
//! Dwell is not cumulative: leaving the target discards all progress and
//! the next entry starts the timer again from zero.

use tracing::{debug, info};

use super::{TestKind, TestResult, TestState};
use crate::clock::Timestamp;
use crate::error::{HarnessError, Result};
use crate::region::Region;

/// Timeout applied when none is given.
pub const DEFAULT_TIMEOUT_S: f64 = 30.0;

/// "Look at region X for N seconds."
#[derive(Debug, Clone)]
pub struct DwellTest {
    target: Region,
    dwell_s: f64,
    timeout_s: f64,
    state: TestState,
    started: Option<Timestamp>,
    dwell_started: Option<Timestamp>,
    in_target: bool,
    result: Option<TestResult>,
}

impl DwellTest {
    pub fn new(target: Region, dwell_s: f64, timeout_s: Option<f64>) -> Result<Self> {
        if !(dwell_s > 0.0) || !dwell_s.is_finite() {
            return Err(HarnessError::InvalidConfiguration(format!(
                "dwell time must be positive, got {dwell_s}"
            )));
        }
        let timeout_s = timeout_s.unwrap_or(DEFAULT_TIMEOUT_S);
        if !(timeout_s > 0.0) {
            return Err(HarnessError::InvalidConfiguration(format!(
                "dwell timeout must be positive, got {timeout_s}"
            )));
        }
        Ok(Self {
            target,
            dwell_s,
            timeout_s,
            state: TestState::Idle,
            started: None,
            dwell_started: None,
            in_target: false,
            result: None,
        })
    }

    pub fn target(&self) -> &Region {
        &self.target
    }

    pub fn dwell_seconds(&self) -> f64 {
        self.dwell_s
    }

    pub fn timeout_seconds(&self) -> f64 {
        self.timeout_s
    }

    pub fn state(&self) -> TestState {
        self.state
    }

    pub fn in_target(&self) -> bool {
        self.in_target
    }

    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    pub fn instruction(&self) -> String {
        format!("Look at {} for {} seconds", self.target.name, self.dwell_s)
    }

    pub fn start(&mut self, now: Timestamp) {
        self.state = TestState::Running;
        self.started = Some(now);
        self.dwell_started = None;
        self.in_target = false;
        self.result = None;
        info!("Dwell test started: {}", self.instruction());
    }

    /// Observe the tracker's current region.
    pub fn on_region(&mut self, region: Option<&Region>, now: Timestamp) {
        if self.state != TestState::Running {
            return;
        }
        let on_target = region.is_some_and(|r| r.id == self.target.id);

        if on_target && !self.in_target {
            self.in_target = true;
            self.dwell_started = Some(now);
            debug!("Dwell: entered {}", self.target.name);
        } else if !on_target && self.in_target {
            self.in_target = false;
            self.dwell_started = None;
            debug!("Dwell: left {}, progress reset", self.target.name);
        }
    }

    /// Evaluate dwell completion, then timeout. Success wins a tie.
    pub fn on_tick(&mut self, now: Timestamp) {
        if self.state != TestState::Running {
            return;
        }

        if self.in_target {
            if let Some(dwell_started) = self.dwell_started {
                if now.since(&dwell_started) >= self.dwell_s {
                    self.complete(true, now);
                    return;
                }
            }
        }

        if let Some(started) = self.started {
            if now.since(&started) > self.timeout_s {
                info!("Dwell test timed out after {:.1}s", self.timeout_s);
                self.complete(false, now);
            }
        }
    }

    /// Fraction of the required dwell held so far, in [0, 1].
    pub fn progress(&self, now: Timestamp) -> f64 {
        match (self.state, self.dwell_started) {
            (TestState::Completed, _) => {
                if self.result.as_ref().is_some_and(|r| r.success) {
                    1.0
                } else {
                    0.0
                }
            }
            (TestState::Running, Some(dwell_started)) if self.in_target => {
                (now.since(&dwell_started) / self.dwell_s).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    /// Abort without producing a result. The test can be started again.
    pub fn stop(&mut self) {
        if self.state == TestState::Running {
            self.state = TestState::Idle;
            self.dwell_started = None;
            self.in_target = false;
        }
    }

    /// End a running test now as a failure.
    pub fn force_complete(&mut self, now: Timestamp) {
        if self.state == TestState::Running {
            self.complete(false, now);
        }
    }

    fn complete(&mut self, success: bool, now: Timestamp) {
        let duration_s = self.started.map(|s| now.since(&s)).unwrap_or(0.0);
        self.state = TestState::Completed;
        self.in_target = false;
        self.dwell_started = None;
        self.result = Some(TestResult {
            kind: TestKind::Dwell,
            success,
            duration_s,
            accuracy: if success { 1.0 } else { 0.0 },
            target_region: Some(self.target.clone()),
            visited_regions: if success {
                vec![self.target.clone()]
            } else {
                Vec::new()
            },
            timestamp_s: now.unix_s,
        });
    }
}
