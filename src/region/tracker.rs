//! Current-region tracking with transition history.

use std::collections::VecDeque;
use tracing::debug;

use super::grid::{Region, RegionGrid};
use crate::gaze::GazePoint;

/// A change of the tracked region, including entering or leaving "no region".
#[derive(Debug, Clone)]
pub struct RegionTransition {
    pub region: Option<Region>,
    pub timestamp_s: f64,
}

/// Outcome of a single tracker update.
#[derive(Debug, Clone)]
pub struct RegionChange {
    pub previous: Option<Region>,
    pub current: Option<Region>,
}

impl RegionChange {
    /// Whether the tracked region identity changed.
    pub fn changed(&self) -> bool {
        region_id(&self.previous) != region_id(&self.current)
    }

    /// Region that was entered by this update, if any.
    pub fn entered(&self) -> Option<&Region> {
        if self.changed() {
            self.current.as_ref()
        } else {
            None
        }
    }

    /// Region that was left by this update, if any.
    pub fn exited(&self) -> Option<&Region> {
        if self.changed() {
            self.previous.as_ref()
        } else {
            None
        }
    }
}

fn region_id(region: &Option<Region>) -> Option<usize> {
    region.as_ref().map(|r| r.id)
}

/// Tracks which grid region the gaze currently rests in.
pub struct RegionTracker {
    grid: RegionGrid,
    current: Option<Region>,
    history: VecDeque<RegionTransition>,
    /// Oldest transitions are evicted beyond this length. `None` keeps all,
    /// `Some(0)` keeps none.
    pub max_history: Option<usize>,
    /// Samples below this confidence count as "no sample".
    pub min_confidence: f64,
}

impl RegionTracker {
    pub fn new(grid: RegionGrid) -> Self {
        Self {
            grid,
            current: None,
            history: VecDeque::new(),
            max_history: None,
            min_confidence: 0.0,
        }
    }

    /// Resolve `point` and record a transition if the region identity changed.
    pub fn update(&mut self, point: Option<&GazePoint>, now_s: f64) -> RegionChange {
        let resolved = point
            .filter(|p| p.confidence >= self.min_confidence)
            .and_then(|p| self.grid.resolve(p.screen_x, p.screen_y))
            .cloned();

        let change = RegionChange {
            previous: self.current.clone(),
            current: resolved,
        };

        if change.changed() {
            debug!(
                "Region transition: {:?} -> {:?}",
                change.previous.as_ref().map(|r| r.name.as_str()),
                change.current.as_ref().map(|r| r.name.as_str()),
            );
            self.current = change.current.clone();
            self.history.push_back(RegionTransition {
                region: change.current.clone(),
                timestamp_s: now_s,
            });
            if let Some(cap) = self.max_history {
                while self.history.len() > cap {
                    self.history.pop_front();
                }
            }
        }

        change
    }

    pub fn current(&self) -> Option<&Region> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &VecDeque<RegionTransition> {
        &self.history
    }

    pub fn grid(&self) -> &RegionGrid {
        &self.grid
    }

    /// Forget the current region and all history. The grid is kept.
    pub fn reset(&mut self) {
        self.current = None;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f64, y: f64) -> GazePoint {
        GazePoint {
            screen_x: x,
            screen_y: y,
            confidence: 0.9,
            timestamp_s: 0.0,
        }
    }

    fn tracker() -> RegionTracker {
        RegionTracker::new(RegionGrid::new(300.0, 300.0, 3, 3).unwrap())
    }

    #[test]
    fn test_enter_and_exit() {
        let mut t = tracker();

        let c = t.update(Some(&point(50.0, 50.0)), 0.0);
        assert!(c.changed());
        assert!(c.exited().is_none());
        assert_eq!(c.entered().unwrap().id, 0);

        let c = t.update(Some(&point(150.0, 50.0)), 0.1);
        assert_eq!(c.exited().unwrap().id, 0);
        assert_eq!(c.entered().unwrap().id, 1);
        assert_eq!(t.current().unwrap().id, 1);
        assert_eq!(t.history().len(), 2);
    }

    #[test]
    fn test_same_region_no_transition() {
        let mut t = tracker();
        t.update(Some(&point(50.0, 50.0)), 0.0);
        // Different coordinates, same cell, re-resolved region clone.
        let c = t.update(Some(&point(60.0, 70.0)), 0.1);
        assert!(!c.changed());
        assert!(c.entered().is_none());
        assert_eq!(t.history().len(), 1);
    }

    #[test]
    fn test_stale_sample_no_transition() {
        let mut t = tracker();
        let p = point(250.0, 250.0);
        for i in 0..10 {
            t.update(Some(&p), i as f64 * 0.033);
        }
        assert_eq!(t.history().len(), 1);
    }

    #[test]
    fn test_losing_gaze_records_none() {
        let mut t = tracker();
        t.update(Some(&point(50.0, 50.0)), 0.0);
        let c = t.update(None, 0.5);
        assert_eq!(c.exited().unwrap().id, 0);
        assert!(t.current().is_none());
        let last = t.history().back().unwrap();
        assert!(last.region.is_none());
        assert_eq!(last.timestamp_s, 0.5);

        // Staying lost is not a transition.
        assert!(!t.update(None, 0.6).changed());
        // Off-screen point also resolves to no region.
        assert!(!t.update(Some(&point(-5.0, 50.0)), 0.7).changed());
    }

    #[test]
    fn test_low_confidence_treated_as_missing() {
        let mut t = tracker();
        t.min_confidence = 0.5;
        let mut p = point(50.0, 50.0);
        p.confidence = 0.2;
        assert!(!t.update(Some(&p), 0.0).changed());
        assert!(t.current().is_none());
    }

    #[test]
    fn test_history_cap() {
        let mut t = tracker();
        t.max_history = Some(3);
        for i in 0..6 {
            let x = if i % 2 == 0 { 50.0 } else { 150.0 };
            t.update(Some(&point(x, 50.0)), i as f64);
        }
        assert_eq!(t.history().len(), 3);
        assert_eq!(t.history().front().unwrap().timestamp_s, 3.0);
    }

    #[test]
    fn test_zero_history_cap_keeps_nothing() {
        let mut t = tracker();
        t.max_history = Some(0);
        let c = t.update(Some(&point(50.0, 50.0)), 0.0);
        assert_eq!(c.entered().unwrap().id, 0);
        t.update(Some(&point(150.0, 50.0)), 0.1);
        assert!(t.history().is_empty());
        assert_eq!(t.current().unwrap().id, 1);
    }

    #[test]
    fn test_reset() {
        let mut t = tracker();
        t.update(Some(&point(50.0, 50.0)), 0.0);
        t.reset();
        assert!(t.current().is_none());
        assert!(t.history().is_empty());
        assert_eq!(t.grid().regions().len(), 9);
    }
}
