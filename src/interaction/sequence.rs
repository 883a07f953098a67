//! Target selection test — visit a random sequence of regions in order.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use super::{TestKind, TestResult, TestState};
use crate::clock::Timestamp;
use crate::error::{HarnessError, Result};
use crate::region::Region;

/// "Look at these regions, in this order."
///
/// Only an exact match on the expected region advances the test. Other
/// regions are ignored without penalty.
#[derive(Debug, Clone)]
pub struct SequenceTest {
    sequence: Vec<Region>,
    current_index: usize,
    visited: Vec<Region>,
    /// Optional deadline; the original task had none.
    pub timeout_s: Option<f64>,
    state: TestState,
    started: Option<Timestamp>,
    result: Option<TestResult>,
}

impl SequenceTest {
    /// Draw `length` distinct regions from `candidates` in random order.
    ///
    /// `length` is clamped to the number of candidates. The order is fixed
    /// for the lifetime of this test.
    pub fn new<R: Rng + ?Sized>(candidates: &[Region], length: usize, rng: &mut R) -> Result<Self> {
        let length = length.min(candidates.len());
        let sequence = candidates.choose_multiple(rng, length).cloned().collect();
        Self::with_sequence(sequence)
    }

    /// Use an explicit target order.
    pub fn with_sequence(sequence: Vec<Region>) -> Result<Self> {
        if sequence.is_empty() {
            return Err(HarnessError::InvalidConfiguration(
                "sequence test needs at least one target region".to_string(),
            ));
        }
        Ok(Self {
            sequence,
            current_index: 0,
            visited: Vec::new(),
            timeout_s: None,
            state: TestState::Idle,
            started: None,
            result: None,
        })
    }

    pub fn sequence(&self) -> &[Region] {
        &self.sequence
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn visited(&self) -> &[Region] {
        &self.visited
    }

    pub fn state(&self) -> TestState {
        self.state
    }

    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    /// Region the user should look at next.
    pub fn current_target(&self) -> Option<&Region> {
        self.sequence.get(self.current_index)
    }

    /// `(matched, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (self.current_index, self.sequence.len())
    }

    pub fn instruction(&self) -> String {
        match self.current_target() {
            Some(target) => format!(
                "Target {} / {}: {}",
                self.current_index + 1,
                self.sequence.len(),
                target.name
            ),
            None => "All targets selected".to_string(),
        }
    }

    pub fn start(&mut self, now: Timestamp) {
        self.state = TestState::Running;
        self.current_index = 0;
        self.visited.clear();
        self.started = Some(now);
        self.result = None;
        info!(
            "Sequence test started ({} targets): {:?}",
            self.sequence.len(),
            self.sequence.iter().map(|r| r.name.as_str()).collect::<Vec<_>>()
        );
    }

    /// Observe the tracker's current region.
    pub fn on_region(&mut self, region: Option<&Region>, now: Timestamp) {
        if self.state != TestState::Running {
            return;
        }
        let (Some(region), Some(expected)) = (region, self.sequence.get(self.current_index)) else {
            return;
        };
        if region.id != expected.id {
            return;
        }

        self.visited.push(region.clone());
        self.current_index += 1;
        debug!(
            "Sequence: matched {} ({}/{})",
            region.name,
            self.current_index,
            self.sequence.len()
        );

        if self.current_index == self.sequence.len() {
            self.complete(now);
        }
    }

    pub fn on_tick(&mut self, now: Timestamp) {
        if self.state != TestState::Running {
            return;
        }
        if let (Some(timeout_s), Some(started)) = (self.timeout_s, self.started) {
            if now.since(&started) > timeout_s {
                info!("Sequence test timed out after {:.1}s", timeout_s);
                self.complete(now);
            }
        }
    }

    /// Abort without producing a result. The test can be started again.
    pub fn stop(&mut self) {
        if self.state == TestState::Running {
            self.state = TestState::Idle;
        }
    }

    /// End a running test now, reporting the fraction matched so far.
    pub fn force_complete(&mut self, now: Timestamp) {
        if self.state == TestState::Running {
            self.complete(now);
        }
    }

    fn complete(&mut self, now: Timestamp) {
        let accuracy = self.visited.len() as f64 / self.sequence.len() as f64;
        self.state = TestState::Completed;
        self.result = Some(TestResult {
            kind: TestKind::Sequence,
            success: accuracy == 1.0,
            duration_s: self.started.map(|s| now.since(&s)).unwrap_or(0.0),
            accuracy,
            target_region: None,
            visited_regions: self.visited.clone(),
            timestamp_s: now.unix_s,
        });
    }
}
