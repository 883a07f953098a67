//! Screen regions — grid partition and current-region tracking.

pub mod grid;
pub mod tracker;

pub use grid::{Region, RegionGrid};
pub use tracker::{RegionChange, RegionTracker, RegionTransition};
