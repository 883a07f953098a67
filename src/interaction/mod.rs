//! Scripted attention tasks driven by gaze region changes and ticks.
//!
//! Each test is a small state machine: `Idle → Running → Completed`.
//! The driver hands it the tracker's current region whenever that changes
//! and a `Timestamp` on every tick; a completed test holds exactly one
//! `TestResult`.

pub mod dwell;
pub mod sequence;

pub use dwell::DwellTest;
pub use sequence::SequenceTest;

use crate::clock::Timestamp;
use crate::region::Region;

// ── Kind ────────────────────────────────────────────────────

/// Which task a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestKind {
    /// Hold gaze on one region.
    Dwell,
    /// Visit regions in a given order.
    Sequence,
}

impl TestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dwell => "dwell",
            Self::Sequence => "sequence",
        }
    }

    /// Human readable label, used in the export.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Dwell => "Region Dwell Test",
            Self::Sequence => "Target Selection Test",
        }
    }

    /// Accepts either the short form or the label.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "dwell" | "Region Dwell Test" => Some(Self::Dwell),
            "sequence" | "Target Selection Test" => Some(Self::Sequence),
            _ => None,
        }
    }
}

// ── State / result ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestState {
    Idle,
    Running,
    Completed,
}

/// Outcome of one completed test. Created once, never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub kind: TestKind,
    pub success: bool,
    /// Seconds from start to completion.
    pub duration_s: f64,
    /// [0.0, 1.0].
    pub accuracy: f64,
    pub target_region: Option<Region>,
    pub visited_regions: Vec<Region>,
    /// Wall-clock completion time, seconds since UNIX epoch.
    pub timestamp_s: f64,
}

// ── Dispatch ────────────────────────────────────────────────

/// A test of either kind.
#[derive(Debug, Clone)]
pub enum InteractionTest {
    Dwell(DwellTest),
    Sequence(SequenceTest),
}

impl InteractionTest {
    pub fn kind(&self) -> TestKind {
        match self {
            Self::Dwell(_) => TestKind::Dwell,
            Self::Sequence(_) => TestKind::Sequence,
        }
    }

    pub fn state(&self) -> TestState {
        match self {
            Self::Dwell(t) => t.state(),
            Self::Sequence(t) => t.state(),
        }
    }

    pub fn start(&mut self, now: Timestamp) {
        match self {
            Self::Dwell(t) => t.start(now),
            Self::Sequence(t) => t.start(now),
        }
    }

    pub fn on_region(&mut self, region: Option<&Region>, now: Timestamp) {
        match self {
            Self::Dwell(t) => t.on_region(region, now),
            Self::Sequence(t) => t.on_region(region, now),
        }
    }

    pub fn on_tick(&mut self, now: Timestamp) {
        match self {
            Self::Dwell(t) => t.on_tick(now),
            Self::Sequence(t) => t.on_tick(now),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state() == TestState::Completed
    }

    pub fn result(&self) -> Option<&TestResult> {
        match self {
            Self::Dwell(t) => t.result(),
            Self::Sequence(t) => t.result(),
        }
    }

    pub fn stop(&mut self) {
        match self {
            Self::Dwell(t) => t.stop(),
            Self::Sequence(t) => t.stop(),
        }
    }

    pub fn force_complete(&mut self, now: Timestamp) {
        match self {
            Self::Dwell(t) => t.force_complete(now),
            Self::Sequence(t) => t.force_complete(now),
        }
    }

    pub fn instruction(&self) -> String {
        match self {
            Self::Dwell(t) => t.instruction(),
            Self::Sequence(t) => t.instruction(),
        }
    }

    /// Completion fraction for display, in [0, 1].
    pub fn progress(&self, now: Timestamp) -> f64 {
        match self {
            Self::Dwell(t) => t.progress(now),
            Self::Sequence(t) => {
                let (done, total) = t.progress();
                done as f64 / total as f64
            }
        }
    }
}

impl From<DwellTest> for InteractionTest {
    fn from(test: DwellTest) -> Self {
        Self::Dwell(test)
    }
}

impl From<SequenceTest> for InteractionTest {
    fn from(test: SequenceTest) -> Self {
        Self::Sequence(test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionGrid;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [TestKind::Dwell, TestKind::Sequence] {
            assert_eq!(TestKind::from_str(kind.as_str()), Some(kind));
            assert_eq!(TestKind::from_str(kind.label()), Some(kind));
        }
        assert_eq!(TestKind::from_str("path-tracking"), None);
    }

    #[test]
    fn test_dispatch_by_variant() {
        let grid = RegionGrid::new(300.0, 300.0, 3, 3).unwrap();
        let target = grid.get(0).unwrap().clone();

        let mut test: InteractionTest = DwellTest::new(target.clone(), 1.0, None).unwrap().into();
        assert_eq!(test.kind(), TestKind::Dwell);
        assert_eq!(test.state(), TestState::Idle);
        test.start(Timestamp::at(0.0));
        test.on_region(Some(&target), Timestamp::at(0.0));
        assert!((test.progress(Timestamp::at(0.5)) - 0.5).abs() < 1e-9);
        test.on_tick(Timestamp::at(1.0));
        assert!(test.is_terminal());
        assert!(test.result().unwrap().success);

        let mut test: InteractionTest =
            SequenceTest::with_sequence(vec![target.clone(), grid.get(1).unwrap().clone()])
                .unwrap()
                .into();
        assert_eq!(test.kind(), TestKind::Sequence);
        test.start(Timestamp::at(0.0));
        test.on_region(Some(&target), Timestamp::at(0.1));
        assert_eq!(test.progress(Timestamp::at(0.1)), 0.5);
        test.force_complete(Timestamp::at(0.2));
        assert!(test.is_terminal());
        assert_eq!(test.result().unwrap().accuracy, 0.5);
    }
}
