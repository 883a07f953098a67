//! Harness configuration, loaded from TOML with CLI overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HarnessError, Result};

/// Screen geometry and grid layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: f64,
    pub height: f64,
    pub rows: usize,
    pub cols: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
            rows: 3,
            cols: 3,
        }
    }
}

/// Sampling and region tracking.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Interval between ticks (ms).
    pub tick_interval_ms: u64,
    /// Interval at which the producer thread polls the gaze source (ms).
    pub source_interval_ms: u64,
    /// Samples below this confidence count as "no gaze".
    pub min_confidence: f64,
    /// Cap on region transition history; unbounded when absent.
    pub history_cap: Option<usize>,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 33,
            source_interval_ms: 33,
            min_confidence: 0.0,
            history_cap: None,
        }
    }
}

impl TrackingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn source_interval(&self) -> Duration {
        Duration::from_millis(self.source_interval_ms)
    }
}

/// Defaults applied to tests that don't set their own values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TestDefaults {
    pub dwell_seconds: f64,
    pub dwell_timeout_seconds: f64,
    pub sequence_length: usize,
    /// Seed for sequence generation; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for TestDefaults {
    fn default() -> Self {
        Self {
            dwell_seconds: 2.0,
            dwell_timeout_seconds: 30.0,
            sequence_length: 5,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("test_results.csv"),
        }
    }
}

/// One entry of the test plan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlannedTest {
    Dwell {
        target: usize,
        dwell_seconds: Option<f64>,
        timeout_seconds: Option<f64>,
    },
    Sequence {
        length: Option<usize>,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub screen: ScreenConfig,
    pub tracking: TrackingConfig,
    pub tests: TestDefaults,
    pub export: ExportConfig,
    pub plan: Vec<PlannedTest>,
}

impl HarnessConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| HarnessError::InvalidConfiguration(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Plan used when none is configured: a centre dwell, then a sequence.
    pub fn default_plan(&self) -> Vec<PlannedTest> {
        let centre = (self.screen.rows / 2) * self.screen.cols + self.screen.cols / 2;
        vec![
            PlannedTest::Dwell {
                target: centre,
                dwell_seconds: None,
                timeout_seconds: None,
            },
            PlannedTest::Sequence { length: None },
        ]
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(HarnessError::InvalidConfiguration(msg));

        if self.screen.rows == 0 || self.screen.cols == 0 {
            return invalid(format!(
                "grid must have at least one row and column, got {}x{}",
                self.screen.rows, self.screen.cols
            ));
        }
        if !(self.screen.width > 0.0 && self.screen.height > 0.0) {
            return invalid(format!(
                "screen size must be positive, got {}x{}",
                self.screen.width, self.screen.height
            ));
        }
        if self.tracking.tick_interval_ms == 0 || self.tracking.source_interval_ms == 0 {
            return invalid("tick and source intervals must be at least 1ms".to_string());
        }
        if !(0.0..=1.0).contains(&self.tracking.min_confidence) {
            return invalid(format!(
                "min_confidence must be within [0, 1], got {}",
                self.tracking.min_confidence
            ));
        }
        if self.tracking.history_cap == Some(0) {
            return invalid("history_cap must be at least 1 when set".to_string());
        }
        if !(self.tests.dwell_seconds > 0.0) {
            return invalid(format!(
                "dwell_seconds must be positive, got {}",
                self.tests.dwell_seconds
            ));
        }
        if !(self.tests.dwell_timeout_seconds > 0.0) {
            return invalid(format!(
                "dwell_timeout_seconds must be positive, got {}",
                self.tests.dwell_timeout_seconds
            ));
        }

        if self.tests.sequence_length == 0 {
            return invalid("sequence_length must be at least 1".to_string());
        }

        let region_count = self.screen.rows * self.screen.cols;
        for (i, entry) in self.plan.iter().enumerate() {
            match entry {
                PlannedTest::Dwell {
                    target,
                    dwell_seconds,
                    timeout_seconds,
                } => {
                    if *target >= region_count {
                        return invalid(format!(
                            "plan[{i}]: target {target} outside grid of {region_count} regions"
                        ));
                    }
                    if dwell_seconds.is_some_and(|d| !(d > 0.0))
                        || timeout_seconds.is_some_and(|t| !(t > 0.0))
                    {
                        return invalid(format!("plan[{i}]: dwell and timeout must be positive"));
                    }
                }
                PlannedTest::Sequence { length } => {
                    if *length == Some(0) {
                        return invalid(format!("plan[{i}]: sequence length must be at least 1"));
                    }
                }
            }
        }
        Ok(())
    }
}
