//! Eye Touch harness — turns a stream of gaze points into an active screen
//! region and pass/fail outcomes for scripted attention tests.
//!
//! The library is headless. Camera capture, gaze estimation and rendering
//! live outside it, behind `gaze::GazeProvider` and `events::HarnessEvent`.

pub mod calibration;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod gaze;
pub mod interaction;
pub mod orchestrator;
pub mod region;
pub mod session;

pub use error::{HarnessError, Result};
