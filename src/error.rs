//! Error kinds surfaced by the harness.

use thiserror::Error;

/// Errors returned by harness operations.
///
/// Requesting statistics with an empty result log is deliberately absent:
/// it yields zero-valued statistics instead.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The gaze source could not be brought up. Tracking does not start.
    #[error("gaze source initialization failed: {0}")]
    InitializationFailure(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A test was started while another one is still active.
    #[error("cannot start {requested} while {active} is still running")]
    ConcurrentTestConflict {
        active: &'static str,
        requested: &'static str,
    },

    /// The gaze source failed after tracking had started.
    #[error("gaze source disconnected: {0}")]
    SourceDisconnected(String),

    /// A region id that the grid does not contain.
    #[error("no region with id {0}")]
    UnknownRegion(usize),

    /// An operation that needs an active test found none.
    #[error("no test is running")]
    NoActiveTest,

    /// Writing or reading the tabular export failed.
    #[error("result export failed: {0}")]
    Export(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
